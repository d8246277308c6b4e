//! Registry error types.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while reading from the scheduler or the key space.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {status} for {path}")]
    Status { path: String, status: u16 },

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("cannot decode response for {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("request for {path} timed out after {timeout_ms}ms")]
    Timeout { path: String, timeout_ms: u64 },

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}
