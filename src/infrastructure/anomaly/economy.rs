//! Economic transaction anomaly detector
//!
//! Four independent checks per transaction, each with its own threshold
//! and each recording its own violation: absolute amount, per-minute
//! frequency, circular trading between the same two actors, and
//! cumulative resource generation against a theoretical hourly bound.
//! A single transaction may trigger several at once.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::EconomyConfig;
use crate::domain::events::{TradeEvent, ViolationKind};
use crate::domain::keys::prefix;
use crate::infrastructure::escalation::Escalator;
use crate::infrastructure::store::CounterStore;

/// Economy monitor over the shared store.
pub struct EconomyMonitor {
    store: Arc<dyn CounterStore>,
    escalator: Arc<Escalator>,
    config: EconomyConfig,
}

impl EconomyMonitor {
    pub fn new(
        store: Arc<dyn CounterStore>,
        escalator: Arc<Escalator>,
        config: EconomyConfig,
    ) -> Self {
        Self {
            store,
            escalator,
            config,
        }
    }

    fn frequency_key(trade: &TradeEvent) -> String {
        format!(
            "{}:freq:{}:{}",
            prefix::ECONOMY,
            trade.actor,
            trade.kind.as_str()
        )
    }

    /// Order-independent key for a pair of actors.
    fn pair_key(a: &str, b: &str) -> String {
        if a <= b {
            format!("{}:pair:{}:{}", prefix::ECONOMY, a, b)
        } else {
            format!("{}:pair:{}:{}", prefix::ECONOMY, b, a)
        }
    }

    fn generation_key(actor: &str, resource: &str) -> String {
        format!("{}:gen:{}:{}", prefix::ECONOMY, actor, resource)
    }

    /// Run all four checks for one transaction. Returns every violation
    /// that fired; the transaction itself is never rejected here.
    pub async fn inspect(&self, trade: &TradeEvent) -> Vec<ViolationKind> {
        if !self.config.enabled {
            return Vec::new();
        }

        let mut violations = Vec::new();

        // (1) absolute amount against the per-kind ceiling
        let ceiling = self.config.amount_ceiling(trade.kind);
        if trade.amount > ceiling {
            debug!(
                actor = %trade.actor,
                amount = trade.amount,
                ceiling = ceiling,
                kind = trade.kind.as_str(),
                "Transaction amount above ceiling"
            );
            violations.push(ViolationKind::ExcessiveAmount);
        }

        // (2) per-minute frequency for the (actor, kind) pair
        match self
            .store
            .window_record(&Self::frequency_key(trade), 60_000)
            .await
        {
            Ok(count) if count > self.config.trades_per_minute => {
                debug!(
                    actor = %trade.actor,
                    count = count,
                    kind = trade.kind.as_str(),
                    "Trade frequency above ceiling"
                );
                violations.push(ViolationKind::TradeFrequency);
            }
            Ok(_) => {}
            Err(e) => warn!(actor = %trade.actor, "Trade frequency check failed open: {}", e),
        }

        // (3) back-and-forth transfers between the same two actors
        if let Some(counterparty) = &trade.counterparty {
            let key = Self::pair_key(&trade.actor, counterparty);
            match self
                .store
                .window_record(&key, self.config.pair_window_secs * 1000)
                .await
            {
                Ok(count) if count > self.config.pair_transfer_limit => {
                    debug!(
                        actor = %trade.actor,
                        counterparty = %counterparty,
                        count = count,
                        "Circular trading pattern detected"
                    );
                    violations.push(ViolationKind::CircularTrade);
                }
                Ok(_) => {}
                Err(e) => warn!(actor = %trade.actor, "Pair transfer check failed open: {}", e),
            }
        }

        // (4) cumulative generation for (actor, resource) in a rolling hour
        if let Some(resource) = &trade.resource {
            let key = Self::generation_key(&trade.actor, resource);
            match self
                .store
                .incr_by_expiring(&key, trade.amount.max(0), 3_600)
                .await
            {
                Ok(total) if total > self.config.generation_cap(resource) => {
                    debug!(
                        actor = %trade.actor,
                        resource = %resource,
                        total = total,
                        "Resource generation above theoretical bound"
                    );
                    violations.push(ViolationKind::ResourceGeneration);
                }
                Ok(_) => {}
                Err(e) => warn!(actor = %trade.actor, "Generation check failed open: {}", e),
            }
        }

        for kind in &violations {
            if let Err(e) = self.escalator.record_violation(&trade.actor, *kind).await {
                warn!(
                    actor = %trade.actor,
                    kind = %kind,
                    "Violation record failed open: {}",
                    e
                );
            }
        }

        violations
    }
}
