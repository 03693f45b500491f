//! Error types for the medcase OCR client.

use thiserror::Error;

use crate::models::JobKind;

/// Result type alias using medcase's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for extraction operations.
///
/// Every failure is terminal for the call that produced it. The client never
/// retries on its own; `is_retryable` only tells a caller whether resubmitting
/// could plausibly help.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-initiated or signal-propagated abandonment
    #[error("OCR request was cancelled")]
    Cancelled,

    /// Wall-clock budget exhausted while the job was still non-terminal
    #[error("{kind} timed out after {timeout_ms}ms")]
    TimedOut { kind: JobKind, timeout_ms: u64 },

    /// The backend reported the job itself failed (message passed through verbatim)
    #[error("{0}")]
    BackendFailed(String),

    /// Network-level failure distinct from cancellation
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success HTTP status
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Authentication failed and could not be refreshed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Backend reply violated the wire contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for every cancellation shape, so callers only match on one.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether a fresh submission could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}
