//! Dispatcher error types

use thiserror::Error;
use shared::SharedError;

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Fatal errors, surfaced to the caller before any request is issued
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure of a single request attempt.
///
/// Never returned to the stream consumer as an error: the engine turns it
/// into [`crate::types::Outcome::Failure`] and the retry coordinator counts
/// it against the prompt's budget.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response body: {0}")]
    MalformedBody(String),

    #[error("request task panicked: {0}")]
    Panicked(String),
}

impl TransportError {
    /// Whether the endpoint reported rate limiting (HTTP 429)
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::Status { status: 429, .. })
    }
}
