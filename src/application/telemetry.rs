//! Violation and escalation events emitted as data
//!
//! The engine reports enforcement activity through a [`TelemetrySink`]
//! rather than as a logging side effect, so the external audit collaborator
//! can consume structured events without depending on any particular
//! logging framework.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::events::ViolationKind;

/// What the engine did about a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementAction {
    /// Violation counted, below the escalation threshold
    Counted,
    /// Escalation threshold reached, actor flagged for investigation
    Flagged,
    /// Identity added to the blacklist
    Blacklisted,
}

/// One enforcement event, suitable for an external audit consumer.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub actor: String,
    pub kind: ViolationKind,
    /// Violation count in the current window after this event
    pub count: u64,
    pub action: EnforcementAction,
    pub at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(actor: impl Into<String>, kind: ViolationKind, count: u64, action: EnforcementAction) -> Self {
        Self {
            actor: actor.into(),
            kind,
            count,
            action,
            at: Utc::now(),
        }
    }
}

/// Consumer of enforcement events.
///
/// Emission must never block or fail the admission path.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: SecurityEvent);
}

/// Channel-backed sink: events are queued for an external consumer task.
pub struct ChannelTelemetrySink {
    tx: mpsc::UnboundedSender<SecurityEvent>,
}

impl ChannelTelemetrySink {
    /// Create the sink and the receiving half for the consumer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SecurityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelTelemetrySink {
    fn emit(&self, event: SecurityEvent) {
        // A dropped receiver means nobody is listening; the event is discarded.
        let _ = self.tx.send(event);
    }
}

/// Sink that discards all events.
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: SecurityEvent) {}
}
