//! Address Campaign
//!
//! Runs delivery-address correction campaigns over a messaging channel:
//! - Operators enroll a contact with the address on file
//! - The customer's replies are answered by a Gemini-backed assistant
//! - A confirmed address marks the contact verified and fires a webhook
//! - State is snapshotted to a file, PostgreSQL, or memory

pub mod assistant;
pub mod campaign;
pub mod config;
pub mod error;
pub mod handlers;
pub mod model;
pub mod persistence;
pub mod routes;
pub mod session;
pub mod settings;
pub mod static_files;
pub mod webhook;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub use campaign::CampaignService;
pub use config::{CampaignConfig, StateBackend};
pub use error::{Error, Result};
pub use routes::create_router;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub campaign: CampaignService,
    pub static_dir: Arc<PathBuf>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(campaign: CampaignService, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            campaign,
            static_dir: Arc::new(static_dir.into()),
            started_at: Instant::now(),
        }
    }
}
