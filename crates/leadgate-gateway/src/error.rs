//! Error types for the Gateway and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use leadgate_core::IntakeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response body used for every intake answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Status plus `{message}` body
pub fn message_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(MessageBody::new(message))).into_response()
}

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl GatewayError {
    /// Status and caller-facing message. Upstream detail stays in the logs.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            GatewayError::Intake(IntakeError::BadRequest(msg)) | GatewayError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            GatewayError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
            GatewayError::Intake(IntakeError::Config(_)) | GatewayError::InvalidConfig(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error".to_string(),
            ),
            GatewayError::CredentialMissing(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error: Token missing".to_string(),
            ),
            GatewayError::Intake(IntakeError::LedgerRead(failure))
            | GatewayError::Intake(IntakeError::Dispatch(failure)) => {
                if failure.timed_out {
                    (StatusCode::GATEWAY_TIMEOUT, "GitHub API timeout".to_string())
                } else if let Some(status) = failure.status {
                    (StatusCode::BAD_GATEWAY, format!("GitHub API error: {}", status))
                } else {
                    (StatusCode::BAD_GATEWAY, "Upstream unavailable".to_string())
                }
            }
            GatewayError::Intake(IntakeError::LedgerWrite(_))
            | GatewayError::Io(_)
            | GatewayError::Serialization(_)
            | GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        message_response(status, message)
    }
}

/// Result type for Gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
