//! Campaign settings and the outreach template

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Opening message sent to every new contact
pub const DEFAULT_TEMPLATE: &str = "Hello! We're preparing to ship your order for \"{productName}\". We noticed the delivery address provided (\"{oldAddress}\") seems incorrect. Could you please provide the correct address?";

const INBOUND_KEY_LEN: usize = 32;
const INBOUND_KEY_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Single global settings instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub webhook_url: String,
    pub auto_delete_done: bool,
    pub gemini_api_key: String,
    pub inbound_api_key: String,
    pub initial_message_template: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            auto_delete_done: false,
            gemini_api_key: String::new(),
            inbound_api_key: generate_inbound_key(),
            initial_message_template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Partial settings update; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub webhook_url: Option<String>,
    pub auto_delete_done: Option<bool>,
    pub gemini_api_key: Option<String>,
    pub inbound_api_key: Option<String>,
    pub initial_message_template: Option<String>,
}

impl Settings {
    /// Overlay stored settings on top of fresh defaults, one key at a time.
    ///
    /// Keys missing from `stored` keep their default. A key whose value does
    /// not fit its field is skipped with a warning; the others still apply.
    pub fn merged_over_defaults(stored: Option<&serde_json::Value>) -> Self {
        let defaults = Self::default();
        let Some(serde_json::Value::Object(stored)) = stored else {
            return defaults;
        };

        let mut merged = match serde_json::to_value(&defaults) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return defaults,
        };
        for (key, value) in stored {
            if value.is_null() {
                continue;
            }
            let previous = merged.insert(key.clone(), value.clone());
            let candidate = serde_json::Value::Object(merged.clone());
            if let Err(e) = serde_json::from_value::<Self>(candidate) {
                warn!(key = %key, error = %e, "Ignoring stored setting with unexpected type");
                match previous {
                    Some(previous) => merged.insert(key.clone(), previous),
                    None => merged.remove(key),
                };
            }
        }

        match serde_json::from_value(serde_json::Value::Object(merged)) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Stored settings are malformed, using defaults");
                defaults
            }
        }
    }

    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(webhook_url) = update.webhook_url {
            self.webhook_url = webhook_url.trim().to_string();
        }
        if let Some(auto_delete_done) = update.auto_delete_done {
            self.auto_delete_done = auto_delete_done;
        }
        if let Some(gemini_api_key) = update.gemini_api_key {
            self.gemini_api_key = gemini_api_key.trim().to_string();
        }
        if let Some(inbound_api_key) = update.inbound_api_key {
            self.inbound_api_key = inbound_api_key.trim().to_string();
        }
        if let Some(template) = update.initial_message_template {
            self.initial_message_template = template;
        }
    }

    /// Replace the inbound key with a fresh one and return it
    pub fn reset_inbound_key(&mut self) -> String {
        self.inbound_api_key = generate_inbound_key();
        self.inbound_api_key.clone()
    }

    pub fn webhook_target(&self) -> Option<&str> {
        let url = self.webhook_url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Render the opening message for a contact
    pub fn render_initial_message(&self, product_name: &str, old_address: &str) -> String {
        let template = if self.initial_message_template.trim().is_empty() {
            DEFAULT_TEMPLATE
        } else {
            self.initial_message_template.as_str()
        };
        render_template(template, product_name, old_address)
    }
}

pub fn render_template(template: &str, product_name: &str, old_address: &str) -> String {
    template
        .replace("{productName}", product_name)
        .replace("{oldAddress}", old_address)
}

/// 32 characters drawn from `[0-9A-Z]`
pub fn generate_inbound_key() -> String {
    let mut rng = rand::thread_rng();
    (0..INBOUND_KEY_LEN)
        .map(|_| INBOUND_KEY_CHARSET[rng.gen_range(0..INBOUND_KEY_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_key_shape() {
        let key = generate_inbound_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(key, generate_inbound_key());
    }

    #[test]
    fn test_render_replaces_every_placeholder() {
        let rendered = render_template(
            "{productName} / {productName} at {oldAddress}",
            "Lamp",
            "Via Po 3",
        );
        assert_eq!(rendered, "Lamp / Lamp at Via Po 3");
    }

    #[test]
    fn test_default_template_rendering() {
        let settings = Settings::default();
        let message = settings.render_initial_message("Blender", "Main St 1");
        assert!(message.starts_with("Hello! We're preparing to ship your order for \"Blender\"."));
        assert!(message.contains("(\"Main St 1\")"));
    }

    #[test]
    fn test_blank_template_falls_back_to_default() {
        let settings = Settings {
            initial_message_template: "   ".to_string(),
            ..Settings::default()
        };
        assert!(settings
            .render_initial_message("Blender", "Main St 1")
            .contains("Blender"));
    }

    #[test]
    fn test_merge_keeps_defaults_for_missing_keys() {
        let stored = serde_json::json!({
            "webhookUrl": "https://hooks.example.com/verified",
            "autoDeleteDone": true
        });
        let settings = Settings::merged_over_defaults(Some(&stored));
        assert_eq!(settings.webhook_url, "https://hooks.example.com/verified");
        assert!(settings.auto_delete_done);
        assert_eq!(settings.initial_message_template, DEFAULT_TEMPLATE);
        assert_eq!(settings.inbound_api_key.len(), 32);
    }

    #[test]
    fn test_merge_skips_only_the_mistyped_key() {
        let stored = serde_json::json!({
            "webhookUrl": "https://hooks.example.com/verified",
            "inboundApiKey": "KEEPME0000000000000000000000000",
            "autoDeleteDone": "yes please",
            "initialMessageTemplate": 42
        });
        let settings = Settings::merged_over_defaults(Some(&stored));
        assert_eq!(settings.webhook_url, "https://hooks.example.com/verified");
        assert_eq!(settings.inbound_api_key, "KEEPME0000000000000000000000000");
        assert!(!settings.auto_delete_done);
        assert_eq!(settings.initial_message_template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_merge_ignores_non_object_blob() {
        let stored = serde_json::json!(["not", "settings"]);
        let settings = Settings::merged_over_defaults(Some(&stored));
        assert_eq!(settings.webhook_url, "");
        assert_eq!(settings.initial_message_template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_apply_partial_update() {
        let mut settings = Settings::default();
        let key = settings.inbound_api_key.clone();
        settings.apply(SettingsUpdate {
            webhook_url: Some("  https://hooks.example.com  ".to_string()),
            ..SettingsUpdate::default()
        });
        assert_eq!(settings.webhook_target(), Some("https://hooks.example.com"));
        assert_eq!(settings.inbound_api_key, key);
    }

    #[test]
    fn test_reset_inbound_key() {
        let mut settings = Settings::default();
        let old = settings.inbound_api_key.clone();
        let new = settings.reset_inbound_key();
        assert_ne!(old, new);
        assert_eq!(settings.inbound_api_key, new);
    }

    #[test]
    fn test_empty_webhook_has_no_target() {
        assert_eq!(Settings::default().webhook_target(), None);
    }
}
