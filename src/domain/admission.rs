//! Admission outcomes and the inbound action model
//!
//! A rejected action is a normal outcome, not an error: rejections carry a
//! stable machine-readable reason, while infrastructure failures never
//! surface here at all (fail-open).

use super::events::{MovementEvent, RequestProfile, TradeEvent};
use super::keys::LimitKey;

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Maximum requests allowed in the current window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Seconds to wait before retrying (only set when blocked)
    pub retry_after: Option<u64>,
}

impl RateLimitDecision {
    /// Create a new allowed decision.
    pub fn allowed(limit: u32, remaining: u32) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            retry_after: None,
        }
    }

    /// Create a new blocked decision.
    pub fn blocked(limit: u32, retry_after: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }
}

/// Why an action was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Identity has an active blacklist entry
    Blacklisted { reason: String },
    /// A rate limit ceiling was reached
    RateLimited { limit: u32, retry_after: Option<u64> },
    /// The one-time nonce was already seen within its window
    ReplayDetected,
    /// The client timestamp is outside the accepted window
    StaleTimestamp,
    /// The operation requires a nonce and none was supplied
    MissingNonce,
}

impl RejectReason {
    /// Stable machine-readable code for the HTTP layer and telemetry.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Blacklisted { .. } => "BLACKLISTED",
            RejectReason::RateLimited { .. } => "RATE_LIMITED",
            RejectReason::ReplayDetected => "REPLAY_DETECTED",
            RejectReason::StaleTimestamp => "STALE_TIMESTAMP",
            RejectReason::MissingNonce => "MISSING_NONCE",
        }
    }
}

/// Final decision for one inbound unit of work.
#[derive(Debug, Clone)]
pub enum AdmissionOutcome {
    Allowed {
        /// Rate limit metadata for response headers, when a limit applied
        rate_limit: Option<RateLimitDecision>,
    },
    Rejected {
        reason: RejectReason,
    },
}

impl AdmissionOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionOutcome::Allowed { .. })
    }
}

/// One-time token attached to an inbound action.
#[derive(Debug, Clone)]
pub struct NonceEnvelope {
    pub value: String,
    /// Client-reported wall-clock timestamp (Unix seconds)
    pub client_timestamp: i64,
}

/// One inbound unit of work to be admitted, throttled, or rejected.
///
/// The calling layer resolves its policy key expression into `limit_key`
/// before building this; the engine never parses expressions.
#[derive(Debug, Clone)]
pub struct InboundAction {
    /// Client identity used for blacklist and frequency tracking
    pub identity: String,
    /// Resolved rate limit key
    pub limit_key: LimitKey,
    /// Protected operation name, for named-policy lookup
    pub operation: Option<String>,
    /// One-time token, when the action carries one
    pub nonce: Option<NonceEnvelope>,
    /// Whether the operation mandates a nonce (missing one is a rejection)
    pub nonce_required: bool,
    /// HTTP-ish request metadata for the frequency heuristics
    pub request: Option<RequestProfile>,
    /// Movement sample for the cheat detector
    pub movement: Option<MovementEvent>,
    /// Economic transaction for the economy detector
    pub trade: Option<TradeEvent>,
}

impl InboundAction {
    /// A plain action with no nonce and no game payload.
    pub fn new(identity: impl Into<String>, limit_key: LimitKey) -> Self {
        Self {
            identity: identity.into(),
            limit_key,
            operation: None,
            nonce: None,
            nonce_required: false,
            request: None,
            movement: None,
            trade: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_allowed() {
        let d = RateLimitDecision::allowed(100, 42);
        assert!(d.allowed);
        assert_eq!(d.remaining, 42);
        assert!(d.retry_after.is_none());
    }

    #[test]
    fn test_decision_blocked() {
        let d = RateLimitDecision::blocked(100, 60);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.retry_after, Some(60));
    }

    #[test]
    fn test_reject_codes_are_stable() {
        assert_eq!(
            RejectReason::Blacklisted {
                reason: "flood".into()
            }
            .code(),
            "BLACKLISTED"
        );
        assert_eq!(RejectReason::ReplayDetected.code(), "REPLAY_DETECTED");
        assert_eq!(
            RejectReason::RateLimited {
                limit: 10,
                retry_after: None
            }
            .code(),
            "RATE_LIMITED"
        );
    }

    #[test]
    fn test_outcome_is_allowed() {
        let outcome = AdmissionOutcome::Allowed { rate_limit: None };
        assert!(outcome.is_allowed());
        let outcome = AdmissionOutcome::Rejected {
            reason: RejectReason::MissingNonce,
        };
        assert!(!outcome.is_allowed());
    }
}
