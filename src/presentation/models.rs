//! HTTP response models

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Standard error response body for rejected requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code, e.g. "RATE_LIMITED"
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional context (remaining counts, retry hints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Unique request identifier for tracking and support
    pub request_id: Uuid,

    /// Error occurrence timestamp
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
