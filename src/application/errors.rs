//! Engine error taxonomy
//!
//! Policy violations are NOT errors: they are normal rejected outcomes
//! (`RejectReason`). The errors here cover the shared store being
//! unreachable and malformed persisted payloads. Every check catches
//! `StoreError` at its own boundary and fails open, so these never
//! propagate to an end caller during admission.

use std::time::Duration;
use thiserror::Error;

/// Failure while talking to the shared counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("store payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}
