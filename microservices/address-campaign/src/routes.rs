//! Router configuration for the Address Campaign API

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::static_files;
use crate::AppState;

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Metrics
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/stats", get(handlers::stats))
        .route("/api/status", get(handlers::api_status))
        // Contacts
        .route(
            "/api/contacts",
            get(handlers::list_contacts).post(handlers::create_contact),
        )
        .route(
            "/api/contacts/{id}",
            get(handlers::get_contact).delete(handlers::delete_contact),
        )
        .route("/api/contacts/{id}/reply", post(handlers::reply_to_contact))
        .route("/api/metrics", get(handlers::metrics))
        // Settings
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/api/settings/inbound-key", post(handlers::reset_inbound_key))
        // Messaging session
        .route("/api/session", get(handlers::get_session))
        .route("/api/session/connect", post(handlers::connect_session))
        .route("/api/session/disconnect", post(handlers::disconnect_session))
        // Channel-side replies
        .route("/api/inbound", post(handlers::inbound_reply))
        // Dashboard
        .fallback(static_files::serve)
        .with_state(state)
}
