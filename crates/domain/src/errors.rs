//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for StoreSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum StoreSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure: connect error, timeout, broken stream.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service answered with a non-success status.
    #[error("{message}")]
    Remote { status: u16, message: String, body: Option<String> },

    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed payload or missing required field. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreSyncError {
    /// Build a [`StoreSyncError::Remote`] with the standard message shape.
    pub fn remote(status: u16, target: &str, body: Option<String>) -> Self {
        Self::Remote {
            status,
            message: format!("remote responded with status {status} for {target}"),
            body,
        }
    }

    /// HTTP status for remote errors.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body captured with a remote error.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Remote { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// `true` for a 4xx remote answer.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Remote { status: 400..=499, .. })
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Remote { status: 409, .. })
    }

    /// A 4xx other than 409: not retried, persisted as a validation failure.
    pub const fn is_terminal_remote(&self) -> bool {
        self.is_client_error() && !self.is_conflict() && !matches!(self.status(), Some(429))
    }

    /// Errors worth another attempt later (5xx, 429, transport failures).
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type alias for StoreSync operations
pub type Result<T> = std::result::Result<T, StoreSyncError>;
