//! Conversational assistant
//!
//! The assistant sees the whole conversation and either keeps talking or
//! calls `updateAddress` once it has a usable address. Everything the
//! campaign needs from the model is reduced to [`AssistantReply`].

mod gemini;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::model::Message;

pub use gemini::{GeminiClient, GeminiConfig};

/// Name of the single function declared to the model
pub const UPDATE_ADDRESS_FN: &str = "updateAddress";

/// Sent when the model produced neither a function call nor text
pub const CLARIFY_FALLBACK: &str = "Could you please clarify your address?";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("No API key configured for the assistant")]
    MissingApiKey,

    #[error("Rate limited")]
    RateLimited,

    #[error("Unauthorized")]
    Unauthorized,
}

pub type Result<T> = std::result::Result<T, AssistantError>;

/// Everything the model needs for one turn
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub history: Vec<Message>,
    pub product_name: String,
    pub current_address: String,
    /// Key from the settings; empty means "use the configured default"
    pub api_key: String,
}

/// Structured function invocation returned by the model
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: serde_json::Value,
}

/// Model output for one turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
}

/// What the campaign does with a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDecision {
    /// The model confirmed a new delivery address
    AddressCaptured(String),
    /// Keep the conversation going with this message
    FollowUp(String),
}

#[derive(Deserialize)]
struct UpdateAddressArgs {
    address: String,
}

impl AssistantReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
        }
    }

    pub fn address_update(address: impl Into<String>) -> Self {
        Self {
            text: None,
            function_calls: vec![FunctionCall {
                name: UPDATE_ADDRESS_FN.to_string(),
                args: serde_json::json!({ "address": address.into() }),
            }],
        }
    }

    /// An address counts only when the model made exactly one call, that call
    /// is `updateAddress`, and its address is non-blank.
    pub fn captured_address(&self) -> Option<String> {
        let [call] = self.function_calls.as_slice() else {
            return None;
        };
        if call.name != UPDATE_ADDRESS_FN {
            return None;
        }
        let args: UpdateAddressArgs = serde_json::from_value(call.args.clone()).ok()?;
        let address = args.address.trim();
        (!address.is_empty()).then(|| address.to_string())
    }

    pub fn decide(&self) -> ReplyDecision {
        if let Some(address) = self.captured_address() {
            return ReplyDecision::AddressCaptured(address);
        }
        let text = self
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(CLARIFY_FALLBACK);
        ReplyDecision::FollowUp(text.to_string())
    }
}

/// Seam between the campaign and whichever model backs it
#[async_trait]
pub trait AssistantModel: Send + Sync {
    async fn respond(&self, request: AssistantRequest) -> Result<AssistantReply>;

    /// Short name for logs and readiness output
    fn name(&self) -> &str;
}

/// System prompt for the logistics assistant
pub fn system_instruction(product_name: &str, current_address: &str) -> String {
    format!(
        "You are a professional delivery logistics assistant.\n\
         The user is receiving a \"{product_name}\".\n\
         The currently registered address is \"{current_address}\", but we know it's incorrect.\n\
         \n\
         Your goal:\n\
         1. Politely explain that the address needs correction for the delivery to proceed.\n\
         2. Be helpful, concise, and friendly.\n\
         3. Once the user provides what looks like a clear, valid, and complete new address, \
         call the '{UPDATE_ADDRESS_FN}' function with that address.\n\
         4. Do not talk about other things. Stay focused on correcting the address.\n\
         5. Once updated, thank the user and tell them delivery will be rescheduled."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_update_call_captures_address() {
        let reply = AssistantReply::address_update("  Via Garibaldi 22, Torino ");
        assert_eq!(
            reply.decide(),
            ReplyDecision::AddressCaptured("Via Garibaldi 22, Torino".to_string())
        );
    }

    #[test]
    fn test_blank_address_is_not_captured() {
        let reply = AssistantReply {
            text: Some("Which street?".to_string()),
            function_calls: vec![FunctionCall {
                name: UPDATE_ADDRESS_FN.to_string(),
                args: json!({ "address": "   " }),
            }],
        };
        assert_eq!(reply.decide(), ReplyDecision::FollowUp("Which street?".to_string()));
    }

    #[test]
    fn test_two_calls_are_not_captured() {
        let mut reply = AssistantReply::address_update("Via Po 1");
        reply.function_calls.push(FunctionCall {
            name: UPDATE_ADDRESS_FN.to_string(),
            args: json!({ "address": "Via Po 2" }),
        });
        assert_eq!(reply.captured_address(), None);
        assert_eq!(
            reply.decide(),
            ReplyDecision::FollowUp(CLARIFY_FALLBACK.to_string())
        );
    }

    #[test]
    fn test_unknown_function_is_ignored() {
        let reply = AssistantReply {
            text: None,
            function_calls: vec![FunctionCall {
                name: "cancelOrder".to_string(),
                args: json!({ "address": "Via Po 1" }),
            }],
        };
        assert_eq!(reply.captured_address(), None);
    }

    #[test]
    fn test_missing_address_argument() {
        let reply = AssistantReply {
            text: None,
            function_calls: vec![FunctionCall {
                name: UPDATE_ADDRESS_FN.to_string(),
                args: json!({ "street": "Via Po 1" }),
            }],
        };
        assert_eq!(reply.captured_address(), None);
    }

    #[test]
    fn test_empty_text_falls_back() {
        assert_eq!(
            AssistantReply::text("  ").decide(),
            ReplyDecision::FollowUp(CLARIFY_FALLBACK.to_string())
        );
    }

    #[test]
    fn test_system_instruction_mentions_order() {
        let prompt = system_instruction("Blender", "Main St 1");
        assert!(prompt.contains("\"Blender\""));
        assert!(prompt.contains("\"Main St 1\""));
        assert!(prompt.contains("'updateAddress'"));
    }
}
