//! Campaign Service
//!
//! Owns the contact list, settings and session, and runs the reply loop:
//! append the customer's message, ask the assistant, then either keep the
//! conversation going or mark the address verified and fire the webhook.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gofor_core::{generate_id, PhoneNumber};
use gofor_telemetry::{Counter, Gauge, Histogram, HistogramSnapshot};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use validator::Validate;

use crate::assistant::{AssistantModel, AssistantRequest, ReplyDecision};
use crate::model::{CampaignMetrics, Contact, ContactStatus, Message, Snapshot};
use crate::persistence::SnapshotStore;
use crate::session::{Session, SessionView};
use crate::settings::{Settings, SettingsUpdate};
use crate::webhook::WebhookDispatcher;
use crate::{Error, Result};

/// Operator form for enrolling a contact. Absent fields read as blank.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct NewContact {
    #[validate(length(min = 1))]
    pub phone_number: String,
    #[validate(length(min = 1))]
    pub product_name: String,
    #[validate(length(min = 1))]
    pub old_address: String,
}

impl NewContact {
    fn trimmed(self) -> Self {
        Self {
            phone_number: self.phone_number.trim().to_string(),
            product_name: self.product_name.trim().to_string(),
            old_address: self.old_address.trim().to_string(),
        }
    }
}

/// How a reply turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyOutcome {
    /// Address verified, contact is now `Done`
    Captured,
    /// Assistant answered, contact stays `Pending`
    Pending,
    /// Assistant call failed; only the customer's message was recorded
    Stalled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResult {
    pub outcome: ReplyOutcome,
    pub contact: Contact,
}

/// Counters reported on `/stats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub model_requests: u64,
    pub model_failures: u64,
    pub model_latency_ms: HistogramSnapshot,
    pub conversations_in_flight: u64,
    pub webhooks_delivered: u64,
    pub webhooks_failed: u64,
    pub store_backend: &'static str,
    pub assistant: String,
}

#[derive(Debug, Default)]
struct CampaignState {
    /// Newest first
    contacts: Vec<Contact>,
    settings: Settings,
    session: Session,
}

#[derive(Clone)]
struct ReplyCounters {
    requests: Counter,
    failures: Counter,
    latency_ms: Histogram,
    in_flight: Gauge,
}

/// Marks a conversation busy until dropped
struct InFlight {
    conversations: Arc<DashMap<String, ()>>,
    contact_id: String,
    gauge: Gauge,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.conversations.remove(&self.contact_id);
        self.gauge.dec();
    }
}

#[derive(Clone)]
pub struct CampaignService {
    state: Arc<RwLock<CampaignState>>,
    store: Arc<dyn SnapshotStore>,
    assistant: Arc<dyn AssistantModel>,
    webhooks: WebhookDispatcher,
    in_flight: Arc<DashMap<String, ()>>,
    save_lock: Arc<tokio::sync::Mutex<()>>,
    counters: ReplyCounters,
    session_phone: String,
}

impl CampaignService {
    /// Build the service from whatever the store holds
    pub async fn load(
        store: Arc<dyn SnapshotStore>,
        assistant: Arc<dyn AssistantModel>,
        webhooks: WebhookDispatcher,
        session_phone: impl Into<String>,
    ) -> Result<Self> {
        let snapshot = store.load().await?.unwrap_or_default();
        let settings = Settings::merged_over_defaults(snapshot.settings.as_ref());

        info!(
            backend = store.backend(),
            contacts = snapshot.contacts.len(),
            "Campaign state loaded"
        );

        Ok(Self {
            state: Arc::new(RwLock::new(CampaignState {
                contacts: snapshot.contacts,
                settings,
                session: Session::default(),
            })),
            store,
            assistant,
            webhooks,
            in_flight: Arc::new(DashMap::new()),
            save_lock: Arc::new(tokio::sync::Mutex::new(())),
            counters: ReplyCounters {
                requests: Counter::new("model_requests"),
                failures: Counter::new("model_failures"),
                latency_ms: Histogram::new("model_latency_ms"),
                in_flight: Gauge::new("conversations_in_flight"),
            },
            session_phone: session_phone.into(),
        })
    }

    // Contacts

    /// Contacts ordered by `last_updated`, newest first, optionally filtered
    pub fn list_contacts(&self, query: Option<&str>) -> Vec<Contact> {
        let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
        let state = self.state.read();
        let mut contacts: Vec<Contact> = state
            .contacts
            .iter()
            .filter(|c| c.matches(&needle))
            .cloned()
            .collect();
        contacts.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        contacts
    }

    pub fn get_contact(&self, id: &str) -> Result<Contact> {
        self.state
            .read()
            .contacts
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::ContactNotFound(id.to_string()))
    }

    pub async fn add_contact(&self, form: NewContact) -> Result<Contact> {
        let form = form.trimmed();
        form.validate()?;

        let contact = {
            let mut state = self.state.write();
            if !state.session.is_connected {
                return Err(Error::SessionDisconnected);
            }

            let opening = state
                .settings
                .render_initial_message(&form.product_name, &form.old_address);
            let now = Utc::now();
            let contact = Contact {
                id: generate_id(),
                phone_number: form.phone_number,
                product_name: form.product_name,
                old_address: form.old_address,
                new_address: None,
                status: ContactStatus::Pending,
                last_updated: now,
                conversation: vec![Message::model(opening)],
            };

            state.contacts.insert(0, contact.clone());
            state.session.record_request();
            contact
        };

        info!(contact_id = %contact.id, phone = %contact.phone_number, "Campaign started");
        self.persist().await;
        Ok(contact)
    }

    pub async fn delete_contact(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write();
            let before = state.contacts.len();
            state.contacts.retain(|c| c.id != id);
            if state.contacts.len() == before {
                return Err(Error::ContactNotFound(id.to_string()));
            }
        }
        info!(contact_id = %id, "Contact deleted");
        self.persist().await;
        Ok(())
    }

    pub fn metrics(&self) -> CampaignMetrics {
        CampaignMetrics::from_contacts(&self.state.read().contacts)
    }

    // Reply loop

    /// Record a customer reply and let the assistant answer it
    pub async fn handle_user_reply(&self, contact_id: &str, text: &str) -> Result<ReplyResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidRequest("reply text is blank".to_string()));
        }

        let _busy = self.begin_turn(contact_id)?;

        let request = {
            let mut state = self.state.write();
            let api_key = state.settings.gemini_api_key.clone();
            let contact = find_mut(&mut state.contacts, contact_id)?;
            if contact.is_done() {
                return Err(Error::AlreadyVerified(contact_id.to_string()));
            }
            contact.push(Message::user(text));
            AssistantRequest {
                history: contact.conversation.clone(),
                product_name: contact.product_name.clone(),
                current_address: contact.old_address.clone(),
                api_key,
            }
        };
        self.persist().await;

        let product_name = request.product_name.clone();
        self.counters.requests.inc();
        let started = Instant::now();
        let response = self.assistant.respond(request).await;
        self.counters
            .latency_ms
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let reply = match response {
            Ok(reply) => reply,
            Err(e) => {
                self.counters.failures.inc();
                error!(
                    contact_id = %contact_id,
                    assistant = self.assistant.name(),
                    error = %e,
                    "Assistant call failed, conversation not advanced"
                );
                return Ok(ReplyResult {
                    outcome: ReplyOutcome::Stalled,
                    contact: self.get_contact(contact_id)?,
                });
            }
        };

        let (outcome, answer, new_address) = match reply.decide() {
            ReplyDecision::AddressCaptured(address) => (
                ReplyOutcome::Captured,
                format!(
                    "Thank you! I've updated the delivery address for your {} to: {}. We'll handle the rest.",
                    product_name, address
                ),
                Some(address),
            ),
            ReplyDecision::FollowUp(text) => (ReplyOutcome::Pending, text, None),
        };

        let (contact, webhook_url, removed) = {
            let mut state = self.state.write();
            let webhook_url = state.settings.webhook_target().map(str::to_string);
            let auto_delete = state.settings.auto_delete_done;

            let contact = find_mut(&mut state.contacts, contact_id)?;
            contact.push(Message::model(answer));
            match new_address {
                Some(address) => {
                    contact.status = ContactStatus::Done;
                    contact.new_address = Some(address);
                }
                None => contact.status = ContactStatus::Pending,
            }
            let contact = contact.clone();

            let removed = outcome == ReplyOutcome::Captured && auto_delete;
            if removed {
                state.contacts.retain(|c| c.id != contact_id);
            }
            (contact, webhook_url, removed)
        };

        if outcome == ReplyOutcome::Captured {
            info!(
                contact_id = %contact.id,
                new_address = contact.new_address.as_deref().unwrap_or_default(),
                auto_deleted = removed,
                "Delivery address verified"
            );
            if let Some(url) = webhook_url {
                self.webhooks.dispatch(&url, contact.clone());
            }
        }

        self.persist().await;
        Ok(ReplyResult { outcome, contact })
    }

    /// Reply arriving from the messaging channel, addressed by phone number.
    ///
    /// Goes to the most recently updated open campaign for that number.
    pub async fn inbound_reply(&self, api_key: &str, phone: &str, text: &str) -> Result<ReplyResult> {
        let contact_id = {
            let state = self.state.read();
            if !inbound_key_matches(api_key, &state.settings.inbound_api_key) {
                return Err(Error::Unauthorized);
            }

            let phone = PhoneNumber::new(phone);
            state
                .contacts
                .iter()
                .filter(|c| !c.is_done() && c.phone().same_line(&phone))
                .max_by_key(|c| c.last_updated)
                .map(|c| c.id.clone())
                .ok_or_else(|| Error::ContactNotFound(phone.to_string()))?
        };

        self.handle_user_reply(&contact_id, text).await
    }

    fn begin_turn(&self, contact_id: &str) -> Result<InFlight> {
        match self.in_flight.entry(contact_id.to_string()) {
            Entry::Occupied(_) => Err(Error::ConversationBusy(contact_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                self.counters.in_flight.inc();
                Ok(InFlight {
                    conversations: self.in_flight.clone(),
                    contact_id: contact_id.to_string(),
                    gauge: self.counters.in_flight.clone(),
                })
            }
        }
    }

    // Settings

    pub fn settings(&self) -> Settings {
        self.state.read().settings.clone()
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Settings {
        let settings = {
            let mut state = self.state.write();
            state.settings.apply(update);
            state.settings.clone()
        };
        info!("Settings updated");
        self.persist().await;
        settings
    }

    pub async fn reset_inbound_key(&self) -> String {
        let key = self.state.write().settings.reset_inbound_key();
        info!("Inbound API key rotated");
        self.persist().await;
        key
    }

    // Session

    pub fn session(&self) -> SessionView {
        self.state.read().session.view()
    }

    pub fn connect_session(&self) -> SessionView {
        let mut state = self.state.write();
        state.session.connect(&self.session_phone);
        info!(phone = %self.session_phone, "Messaging session connected");
        state.session.view()
    }

    pub fn disconnect_session(&self) -> SessionView {
        let mut state = self.state.write();
        state.session.disconnect();
        warn!("Messaging session disconnected");
        state.session.view()
    }

    // Operations

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            model_requests: self.counters.requests.get(),
            model_failures: self.counters.failures.get(),
            model_latency_ms: self.counters.latency_ms.snapshot(),
            conversations_in_flight: self.counters.in_flight.get(),
            webhooks_delivered: self.webhooks.delivered(),
            webhooks_failed: self.webhooks.failed(),
            store_backend: self.store.backend(),
            assistant: self.assistant.name().to_string(),
        }
    }

    pub async fn store_healthy(&self) -> bool {
        self.store.is_healthy().await
    }

    /// Save the current snapshot. Failures are logged, never surfaced.
    async fn persist(&self) {
        let _serial = self.save_lock.lock().await;
        let snapshot = {
            let state = self.state.read();
            Snapshot::new(state.contacts.clone(), &state.settings)
        };
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(backend = self.store.backend(), error = %e, "Failed to persist campaign state");
        }
    }
}

fn find_mut<'a>(contacts: &'a mut [Contact], id: &str) -> Result<&'a mut Contact> {
    contacts
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| Error::ContactNotFound(id.to_string()))
}

/// Constant-time comparison; an empty configured key accepts nothing
fn inbound_key_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty()
        && ring::constant_time::verify_slices_are_equal(presented.as_bytes(), expected.as_bytes())
            .is_ok()
}
