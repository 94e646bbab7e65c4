//! Gemini API Client
//!
//! HTTP client for the `generateContent` endpoint with function calling.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{
    system_instruction, AssistantError, AssistantModel, AssistantReply, AssistantRequest,
    FunctionCall, Result, UPDATE_ADDRESS_FN,
};
use crate::model::{Message, MessageRole};

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    /// Used when the settings carry no key of their own
    pub default_api_key: String,
    pub request_timeout_secs: u64,
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    default_api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            default_api_key: config.default_api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn resolve_key<'a>(&'a self, request: &'a AssistantRequest) -> Result<&'a str> {
        let key = request.api_key.trim();
        if !key.is_empty() {
            return Ok(key);
        }
        let fallback = self.default_api_key.trim();
        if fallback.is_empty() {
            return Err(AssistantError::MissingApiKey);
        }
        Ok(fallback)
    }
}

#[async_trait]
impl AssistantModel for GeminiClient {
    async fn respond(&self, request: AssistantRequest) -> Result<AssistantReply> {
        let api_key = self.resolve_key(&request)?;
        let body = build_request(&request);

        debug!(model = %self.model, turns = body.contents.len(), "Sending conversation to Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let parsed: GenerateContentResponse = response.json().await?;
                Ok(parsed.into_reply())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AssistantError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(AssistantError::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AssistantError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Model => "model",
        // The API only knows user/model turns
        MessageRole::User | MessageRole::System => "user",
    }
}

fn to_content(message: &Message) -> Content {
    Content {
        role: Some(wire_role(message.role).to_string()),
        parts: vec![Part {
            text: Some(message.content.clone()),
            function_call: None,
        }],
    }
}

fn update_address_declaration() -> serde_json::Value {
    json!({
        "name": UPDATE_ADDRESS_FN,
        "description": "Update the delivery address for the user after they provide a valid one.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "address": {
                    "type": "STRING",
                    "description": "The complete, verified new address provided by the user."
                }
            },
            "required": ["address"]
        }
    })
}

fn build_request(request: &AssistantRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: request.history.iter().map(to_content).collect(),
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: Some(system_instruction(
                    &request.product_name,
                    &request.current_address,
                )),
                function_call: None,
            }],
        },
        tools: vec![Tool {
            function_declarations: vec![update_address_declaration()],
        }],
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GenerateContentResponse {
    /// Only the first candidate is considered
    fn into_reply(self) -> AssistantReply {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return AssistantReply::default();
        };

        let mut text = String::new();
        let mut function_calls = Vec::new();
        for part in candidate.content.parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                function_calls.push(FunctionCall {
                    name: call.name,
                    args: call.args,
                });
            }
        }

        AssistantReply {
            text: (!text.is_empty()).then_some(text),
            function_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;

    fn request() -> AssistantRequest {
        AssistantRequest {
            history: vec![
                Message::model("Could you please provide the correct address?"),
                Message::user("Via Garibaldi 22, Torino"),
                Message::new(MessageRole::System, "operator note"),
            ],
            product_name: "Espresso Machine".to_string(),
            current_address: "Via Roma 1".to_string(),
            api_key: String::new(),
        }
    }

    fn client(default_api_key: &str) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            base_url: "https://generativelanguage.googleapis.com/v1beta/".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            default_api_key: default_api_key.to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(build_request(&request())).unwrap();

        assert_eq!(body["contents"][0]["role"], "model");
        assert_eq!(body["contents"][1]["role"], "user");
        assert_eq!(body["contents"][2]["role"], "user");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "Via Garibaldi 22, Torino");
        assert!(body["systemInstruction"].get("role").is_none());
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Espresso Machine"));

        let declaration = &body["tools"][0]["functionDeclarations"][0];
        assert_eq!(declaration["name"], "updateAddress");
        assert_eq!(declaration["parameters"]["required"][0], "address");
    }

    #[test]
    fn test_parse_function_call_response() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": "updateAddress",
                            "args": { "address": "Via Garibaldi 22, Torino" }
                        }
                    }]
                }
            }]
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let reply = parsed.into_reply();
        assert_eq!(reply.text, None);
        assert_eq!(
            reply.captured_address().as_deref(),
            Some("Via Garibaldi 22, Torino")
        );
    }

    #[test]
    fn test_parse_text_response_joins_parts() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "Thanks! " }, { "text": "Which city is that in?" }]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "totalTokenCount": 42 }
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let reply = parsed.into_reply();
        assert_eq!(reply.text.as_deref(), Some("Thanks! Which city is that in?"));
        assert!(reply.function_calls.is_empty());
    }

    #[test]
    fn test_parse_empty_response() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(parsed.into_reply(), AssistantReply::default());
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        assert_eq!(
            client("k").endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[test]
    fn test_settings_key_wins_over_default() {
        let client = client("env-key");
        let mut req = request();
        assert_eq!(client.resolve_key(&req).unwrap(), "env-key");
        req.api_key = "settings-key".to_string();
        assert_eq!(client.resolve_key(&req).unwrap(), "settings-key");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = client("");
        let err = client.respond(request()).await.unwrap_err();
        assert!(matches!(err, AssistantError::MissingApiKey));
    }
}
