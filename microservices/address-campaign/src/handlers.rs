//! HTTP handlers for the Address Campaign API

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use gofor_core::{DependencyStatus, HealthStatus, ReadinessStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

use crate::campaign::{NewContact, ReplyResult, ServiceStats};
use crate::model::{CampaignMetrics, Contact};
use crate::session::SessionView;
use crate::settings::{Settings, SettingsUpdate};
use crate::{AppState, Error, Result};

/// Header carrying the inbound API key
pub const INBOUND_KEY_HEADER: &str = "x-api-key";

/// Service id reported by `/health` and the runtime
pub const SERVICE_ID: &str = "address-campaign";

/// Stats response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub campaign: ServiceStats,
}

#[derive(Deserialize)]
pub struct ContactQuery {
    pub q: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ReplyRequest {
    pub text: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct InboundRequest {
    pub phone_number: String,
    pub text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundKeyResponse {
    pub inbound_api_key: String,
}

// ============================================
// Health & Metrics Handlers
// ============================================

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        healthy: true,
        service_id: SERVICE_ID.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessStatus>) {
    let started = Instant::now();
    let store = state.campaign.store_healthy().await;
    let status = if store {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessStatus {
            ready: store,
            dependencies: vec![DependencyStatus {
                name: state.campaign.stats().store_backend.to_string(),
                available: store,
                latency_ms: Some(started.elapsed().as_millis() as u64),
            }],
        }),
    )
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        campaign: state.campaign.stats(),
    })
}

pub async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "GoFor360 API is running",
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "contacts": "/api/contacts"
        }
    }))
}

// ============================================
// Contact Handlers
// ============================================

pub async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> Json<Vec<Contact>> {
    Json(state.campaign.list_contacts(query.q.as_deref()))
}

pub async fn create_contact(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewContact>, JsonRejection>,
) -> Result<(StatusCode, Json<Contact>)> {
    let Json(req) = payload?;
    let contact = state.campaign.add_contact(req).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Contact>> {
    Ok(Json(state.campaign.get_contact(&id)?))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.campaign.delete_contact(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reply_to_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<Json<ReplyResult>> {
    let Json(req) = payload?;
    Ok(Json(state.campaign.handle_user_reply(&id, &req.text).await?))
}

pub async fn metrics(State(state): State<AppState>) -> Json<CampaignMetrics> {
    Json(state.campaign.metrics())
}

// ============================================
// Settings Handlers
// ============================================

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.campaign.settings())
}

pub async fn update_settings(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<Settings>> {
    let Json(update) = payload?;
    Ok(Json(state.campaign.update_settings(update).await))
}

pub async fn reset_inbound_key(State(state): State<AppState>) -> Json<InboundKeyResponse> {
    Json(InboundKeyResponse {
        inbound_api_key: state.campaign.reset_inbound_key().await,
    })
}

// ============================================
// Session Handlers
// ============================================

pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.campaign.session())
}

pub async fn connect_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.campaign.connect_session())
}

pub async fn disconnect_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.campaign.disconnect_session())
}

// ============================================
// Inbound Channel Handler
// ============================================

pub async fn inbound_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<InboundRequest>, JsonRejection>,
) -> Result<Json<ReplyResult>> {
    let api_key = headers
        .get(INBOUND_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::Unauthorized)?;
    let Json(req) = payload?;

    let result = state
        .campaign
        .inbound_reply(api_key, &req.phone_number, &req.text)
        .await?;
    Ok(Json(result))
}
