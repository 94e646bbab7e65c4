//! Campaign data model

use chrono::{DateTime, Utc};
use gofor_core::PhoneNumber;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Where a contact is in its campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactStatus {
    #[serde(rename = "Not Sent")]
    NotSent,
    Pending,
    Done,
}

/// Who authored a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
    System,
}

/// One conversation entry. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, content)
    }
}

/// A phone number enrolled in an address-correction campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub phone_number: String,
    pub product_name: String,
    pub old_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_address: Option<String>,
    pub status: ContactStatus,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub conversation: Vec<Message>,
}

impl Contact {
    pub fn phone(&self) -> PhoneNumber {
        PhoneNumber::new(self.phone_number.as_str())
    }

    pub fn is_done(&self) -> bool {
        self.status == ContactStatus::Done
    }

    /// Append a message and bump `last_updated`
    pub fn push(&mut self, message: Message) {
        self.last_updated = message.timestamp;
        self.conversation.push(message);
    }

    /// Case-insensitive match over every text field and the conversation.
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(needle);
        hit(&self.phone_number)
            || hit(&self.product_name)
            || hit(&self.old_address)
            || self.new_address.as_deref().is_some_and(hit)
            || self.conversation.iter().any(|m| hit(&m.content))
    }
}

/// The persisted `{ contacts, settings }` blob
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

impl Snapshot {
    pub fn new(contacts: Vec<Contact>, settings: &Settings) -> Self {
        Self {
            contacts,
            settings: serde_json::to_value(settings).ok(),
        }
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetrics {
    pub total: usize,
    pub pending: usize,
    pub done: usize,
    /// Percentage of contacts verified, rounded to the nearest integer
    pub success_rate: u32,
}

impl CampaignMetrics {
    pub fn from_contacts(contacts: &[Contact]) -> Self {
        let total = contacts.len();
        let pending = contacts
            .iter()
            .filter(|c| c.status == ContactStatus::Pending)
            .count();
        let done = contacts.iter().filter(|c| c.is_done()).count();
        let success_rate = if total > 0 {
            ((done as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total,
            pending,
            done,
            success_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(status: ContactStatus) -> Contact {
        Contact {
            id: gofor_core::generate_id(),
            phone_number: "+39 333 000 1111".to_string(),
            product_name: "Espresso Machine".to_string(),
            old_address: "Via Roma 1".to_string(),
            new_address: None,
            status,
            last_updated: Utc::now(),
            conversation: vec![Message::model("Hello")],
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ContactStatus::NotSent).unwrap(),
            "\"Not Sent\""
        );
        assert_eq!(serde_json::to_string(&ContactStatus::Done).unwrap(), "\"Done\"");
        let parsed: ContactStatus = serde_json::from_str("\"Pending\"").unwrap();
        assert_eq!(parsed, ContactStatus::Pending);
    }

    #[test]
    fn test_contact_uses_camel_case_fields() {
        let value = serde_json::to_value(contact(ContactStatus::Pending)).unwrap();
        assert!(value.get("phoneNumber").is_some());
        assert!(value.get("lastUpdated").is_some());
        assert!(value.get("newAddress").is_none());
        assert_eq!(value["conversation"][0]["role"], "model");
    }

    #[test]
    fn test_contact_search_covers_conversation() {
        let mut c = contact(ContactStatus::Pending);
        c.push(Message::user("It is Via Garibaldi 22, Torino"));
        assert!(c.matches("garibaldi"));
        assert!(c.matches("espresso"));
        assert!(c.matches("333 000"));
        assert!(!c.matches("napoli"));
        assert!(c.matches(""));
    }

    #[test]
    fn test_push_bumps_last_updated() {
        let mut c = contact(ContactStatus::Pending);
        c.last_updated = Utc::now() - chrono::Duration::hours(1);
        let before = c.last_updated;
        c.push(Message::user("hi"));
        assert!(c.last_updated > before);
        assert_eq!(c.conversation.len(), 2);
    }

    #[test]
    fn test_metrics_rounding() {
        let contacts = vec![
            contact(ContactStatus::Done),
            contact(ContactStatus::Pending),
            contact(ContactStatus::Pending),
        ];
        let metrics = CampaignMetrics::from_contacts(&contacts);
        assert_eq!(metrics.total, 3);
        assert_eq!(metrics.pending, 2);
        assert_eq!(metrics.done, 1);
        assert_eq!(metrics.success_rate, 33);

        let two_thirds = vec![
            contact(ContactStatus::Done),
            contact(ContactStatus::Done),
            contact(ContactStatus::NotSent),
        ];
        assert_eq!(CampaignMetrics::from_contacts(&two_thirds).success_rate, 67);
    }

    #[test]
    fn test_metrics_empty() {
        let metrics = CampaignMetrics::from_contacts(&[]);
        assert_eq!(metrics.success_rate, 0);
        assert_eq!(metrics.total, 0);
    }
}
