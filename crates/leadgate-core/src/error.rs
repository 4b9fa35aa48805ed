//! Error types for the intake core

use thiserror::Error;

/// Details of a failed call to the remote store or dispatch endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    /// HTTP status returned by the upstream, if a response arrived at all
    pub status: Option<u16>,

    /// Response body or transport error text. Logged, never shown to callers.
    pub detail: String,

    /// The call hit the configured timeout
    pub timed_out: bool,
}

impl UpstreamFailure {
    /// Upstream answered with a non-success status
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            detail: detail.into(),
            timed_out: false,
        }
    }

    /// No usable response (connection refused, DNS, malformed body, ...)
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: detail.into(),
            timed_out: false,
        }
    }
}

impl From<reqwest::Error> for UpstreamFailure {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            detail: e.to_string(),
            timed_out: e.is_timeout(),
        }
    }
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.timed_out) {
            (_, true) => write!(f, "timed out: {}", self.detail),
            (Some(status), false) => write!(f, "status {}: {}", status, self.detail),
            (None, false) => write!(f, "{}", self.detail),
        }
    }
}

/// Intake error type
///
/// `LedgerWrite` never reaches the caller of an intake: once the dispatch has
/// fired, a failed commit is folded into [`crate::CommitStatus`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger read failed: {0}")]
    LedgerRead(UpstreamFailure),

    #[error("Dispatch failed: {0}")]
    Dispatch(UpstreamFailure),

    #[error("Ledger write failed: {0}")]
    LedgerWrite(UpstreamFailure),
}

impl IntakeError {
    /// Upstream failure carried by this error, if any
    pub fn upstream(&self) -> Option<&UpstreamFailure> {
        match self {
            IntakeError::LedgerRead(f) | IntakeError::Dispatch(f) | IntakeError::LedgerWrite(f) => {
                Some(f)
            }
            IntakeError::BadRequest(_) | IntakeError::Config(_) => None,
        }
    }
}

/// Result type for intake operations
pub type Result<T> = std::result::Result<T, IntakeError>;
