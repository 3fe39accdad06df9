//! Escalation primitive
//!
//! The single counting block behind every behavioral detector: count
//! violations per actor per window, and beyond the threshold flag the
//! actor for investigation. The flag is a long-lived record consumed by an
//! external review process; it does not auto-block by itself.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::errors::StoreError;
use crate::application::telemetry::{EnforcementAction, SecurityEvent, TelemetrySink};
use crate::config::EscalationConfig;
use crate::domain::events::ViolationKind;
use crate::domain::keys::prefix;
use crate::infrastructure::store::CounterStore;

/// Investigation flag written when an actor crosses the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationFlag {
    pub actor: String,
    pub kind: ViolationKind,
    /// Violation count at the moment of flagging
    pub count: u64,
    /// Unix seconds
    pub flagged_at: i64,
}

/// Counts violations and escalates past the configured threshold.
pub struct Escalator {
    store: Arc<dyn CounterStore>,
    sink: Arc<dyn TelemetrySink>,
    config: EscalationConfig,
}

impl Escalator {
    pub fn new(
        store: Arc<dyn CounterStore>,
        sink: Arc<dyn TelemetrySink>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    fn counter_key(actor: &str, kind: ViolationKind) -> String {
        format!("{}:{}:{}", prefix::SUSPICION, kind.as_str(), actor)
    }

    fn flag_key(actor: &str, kind: ViolationKind) -> String {
        format!("{}:{}:{}", prefix::FLAG, kind.as_str(), actor)
    }

    /// Record one violation. Returns `true` when the actor has reached the
    /// escalation threshold within the window; the window expiring resets
    /// the count to zero.
    pub async fn record_violation(
        &self,
        actor: &str,
        kind: ViolationKind,
    ) -> Result<bool, StoreError> {
        let key = Self::counter_key(actor, kind);
        let count = self
            .store
            .incr_expiring(&key, self.config.window_secs)
            .await?;

        let escalated = count >= self.config.threshold;

        if count == self.config.threshold {
            let flag = InvestigationFlag {
                actor: actor.to_string(),
                kind,
                count,
                flagged_at: Utc::now().timestamp(),
            };
            let payload = serde_json::to_string(&flag)?;
            self.store
                .set_raw(
                    &Self::flag_key(actor, kind),
                    &payload,
                    self.config.flag_ttl_secs,
                )
                .await?;

            info!(
                actor = %actor,
                kind = %kind,
                count = count,
                "Actor flagged for investigation"
            );
            self.sink.emit(SecurityEvent::new(
                actor,
                kind,
                count,
                EnforcementAction::Flagged,
            ));
        } else {
            debug!(actor = %actor, kind = %kind, count = count, "Violation recorded");
            self.sink.emit(SecurityEvent::new(
                actor,
                kind,
                count,
                EnforcementAction::Counted,
            ));
        }

        Ok(escalated)
    }

    /// Current violation count for an actor within the window.
    pub async fn violation_count(
        &self,
        actor: &str,
        kind: ViolationKind,
    ) -> Result<u64, StoreError> {
        let key = Self::counter_key(actor, kind);
        match self.store.get_raw(&key).await? {
            Some(raw) => Ok(raw.parse::<u64>().unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Active investigation flag for an actor, if any.
    pub async fn flag(
        &self,
        actor: &str,
        kind: ViolationKind,
    ) -> Result<Option<InvestigationFlag>, StoreError> {
        match self.store.get_raw(&Self::flag_key(actor, kind)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry::ChannelTelemetrySink;
    use crate::infrastructure::store::InMemoryCounterStore;

    fn escalator_with_sink() -> (
        Escalator,
        tokio::sync::mpsc::UnboundedReceiver<SecurityEvent>,
    ) {
        let (sink, rx) = ChannelTelemetrySink::new();
        let escalator = Escalator::new(
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(sink),
            EscalationConfig::default(),
        );
        (escalator, rx)
    }

    #[tokio::test]
    async fn test_threshold_monotonicity() {
        let (escalator, _rx) = escalator_with_sink();

        // Default threshold is 5: calls 1..4 report false, the 5th true
        for _ in 0..4 {
            assert!(
                !escalator
                    .record_violation("cheater", ViolationKind::Speed)
                    .await
                    .unwrap()
            );
        }
        assert!(
            escalator
                .record_violation("cheater", ViolationKind::Speed)
                .await
                .unwrap()
        );
        // Further violations stay escalated
        assert!(
            escalator
                .record_violation("cheater", ViolationKind::Speed)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_flag_written_at_threshold() {
        let (escalator, _rx) = escalator_with_sink();

        for _ in 0..5 {
            escalator
                .record_violation("cheater", ViolationKind::Speed)
                .await
                .unwrap();
        }

        let flag = escalator
            .flag("cheater", ViolationKind::Speed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(flag.actor, "cheater");
        assert_eq!(flag.kind, ViolationKind::Speed);
        assert_eq!(flag.count, 5);
    }

    #[tokio::test]
    async fn test_kinds_count_independently() {
        let (escalator, _rx) = escalator_with_sink();

        for _ in 0..4 {
            escalator
                .record_violation("actor", ViolationKind::Speed)
                .await
                .unwrap();
        }
        // A different violation type starts from zero
        assert!(
            !escalator
                .record_violation("actor", ViolationKind::CircularTrade)
                .await
                .unwrap()
        );
        assert_eq!(
            escalator
                .violation_count("actor", ViolationKind::Speed)
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_events_emitted_with_actions() {
        let (escalator, mut rx) = escalator_with_sink();

        for _ in 0..5 {
            escalator
                .record_violation("actor", ViolationKind::TradeFrequency)
                .await
                .unwrap();
        }

        let mut actions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            actions.push(event.action);
        }
        assert_eq!(actions.len(), 5);
        assert_eq!(actions[4], EnforcementAction::Flagged);
        assert!(
            actions[..4]
                .iter()
                .all(|a| *a == EnforcementAction::Counted)
        );
    }
}
