//! Verified-address webhook
//!
//! Delivery is fire-and-forget: one POST on a background task, the outcome is
//! only logged and counted.

use chrono::{DateTime, Utc};
use gofor_telemetry::Counter;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::model::Contact;

pub const ADDRESS_VERIFIED_EVENT: &str = "address_verified";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event: &'static str,
    pub contact: Contact,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
    delivered: Counter,
    failed: Counter,
}

impl WebhookDispatcher {
    pub fn new(timeout_secs: u64) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            delivered: Counter::new("webhooks_delivered"),
            failed: Counter::new("webhooks_failed"),
        })
    }

    /// Hand the verified contact to `url` in the background
    pub fn dispatch(&self, url: &str, contact: Contact) -> JoinHandle<()> {
        let event = WebhookEvent {
            event: ADDRESS_VERIFIED_EVENT,
            contact,
            dispatched_at: Utc::now(),
        };
        let client = self.client.clone();
        let delivered = self.delivered.clone();
        let failed = self.failed.clone();
        let url = url.to_string();

        info!(
            phone = %event.contact.phone_number,
            url = %url,
            "Dispatching verified address webhook"
        );

        tokio::spawn(async move {
            let result = client
                .post(&url)
                .json(&event)
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match result {
                Ok(response) => {
                    delivered.inc();
                    info!(
                        contact_id = %event.contact.id,
                        status = response.status().as_u16(),
                        "Webhook delivered"
                    );
                }
                Err(e) => {
                    failed.inc();
                    warn!(contact_id = %event.contact.id, url = %url, error = %e, "Webhook delivery failed");
                }
            }
        })
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.get()
    }

    pub fn failed(&self) -> u64 {
        self.failed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContactStatus, Message};

    fn verified_contact() -> Contact {
        Contact {
            id: "c-1".to_string(),
            phone_number: "+39 333 000 1111".to_string(),
            product_name: "Lamp".to_string(),
            old_address: "Via Roma 1".to_string(),
            new_address: Some("Via Po 3".to_string()),
            status: ContactStatus::Done,
            last_updated: Utc::now(),
            conversation: vec![Message::model("Thank you!")],
        }
    }

    #[test]
    fn test_event_payload_shape() {
        let event = WebhookEvent {
            event: ADDRESS_VERIFIED_EVENT,
            contact: verified_contact(),
            dispatched_at: Utc::now(),
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["event"], "address_verified");
        assert_eq!(value["contact"]["newAddress"], "Via Po 3");
        assert_eq!(value["contact"]["status"], "Done");
        assert!(value.get("dispatchedAt").is_some());
    }

    #[tokio::test]
    async fn test_unreachable_target_is_counted_not_raised() {
        let dispatcher = WebhookDispatcher::new(2).unwrap();
        dispatcher
            .dispatch("http://127.0.0.1:1/hook", verified_contact())
            .await
            .unwrap();
        assert_eq!(dispatcher.failed(), 1);
        assert_eq!(dispatcher.delivered(), 0);
    }
}
