//! Error types for Address Campaign

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Address Campaign error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Address already verified for contact {0}")]
    AlreadyVerified(String),

    #[error("A reply for contact {0} is already being processed")]
    ConversationBusy(String),

    #[error("Messaging session is not connected")]
    SessionDisconnected,

    #[error("Invalid inbound API key")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
        fields.sort_unstable();
        Error::InvalidRequest(format!("missing or blank fields: {}", fields.join(", ")))
    }
}

impl From<crate::persistence::PersistenceError> for Error {
    fn from(err: crate::persistence::PersistenceError) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Malformed or mistyped JSON bodies answer with the usual error envelope
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::ContactNotFound(_) | Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::AlreadyVerified(_) | Error::ConversationBusy(_) | Error::SessionDisconnected => {
                (StatusCode::CONFLICT, self.to_string())
            }
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::Storage(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
