//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// `Clone` is required because a single coalesced load hands the same
/// result to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key is absent from both the cache and the backing store
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Backing store could not serve a load or remote delete
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backing store rejected a write
    #[error("Backend write failed: {0}")]
    BackendWriteFailed(String),

    /// Write-back flush of a dirty entry failed
    #[error("Flush failed for key '{key}': {reason}")]
    FlushFailed { key: String, reason: String },

    /// Waiting on an in-flight load exceeded the configured timeout
    #[error("Load of key '{key}' timed out after {timeout:?}")]
    LoadTimeout { key: String, timeout: Duration },

    /// Entry can never fit, even in an empty cache
    #[error("Entry '{key}' of size {size} exceeds capacity {capacity}")]
    EntryTooLarge {
        key: String,
        size: usize,
        capacity: usize,
    },

    /// Capacity configured as zero
    #[error("Capacity misconfigured: {0}")]
    CapacityMisconfigured(String),

    /// Space could not be freed because dirty victims failed to flush
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Invalid request data or configuration value
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::BackendWriteFailed(_) => StatusCode::BAD_GATEWAY,
            CacheError::LoadTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::CacheFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::FlushFailed { .. }
            | CacheError::CapacityMisconfigured(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_key() {
        let err = CacheError::EntryTooLarge {
            key: "big".to_string(),
            size: 10,
            capacity: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("big"));
        assert!(msg.contains("10"));
        assert!(msg.contains("4"));
    }

    #[test]
    fn test_load_timeout_display() {
        let err = CacheError::LoadTimeout {
            key: "slow".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("slow"));
        assert!(err.to_string().contains("250ms"));
    }
}
