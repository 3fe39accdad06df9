//! Inbound event records consumed by the behavioral detectors
//!
//! These are immutable inputs: the engine never persists them as-is, only
//! the derived counters and state (last known position, per-window totals).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Movement mode of a player, each with its own speed ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Walk,
    Run,
    Mount,
    Fly,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Walk => "walk",
            MovementType::Run => "run",
            MovementType::Mount => "mount",
            MovementType::Fly => "fly",
        }
    }
}

/// A single position sample reported by the game layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovementSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Wall-clock timestamp of the sample (Unix milliseconds)
    pub timestamp_ms: u64,
    pub movement: MovementType,
}

impl MovementSample {
    /// Euclidean distance to another sample, in world units.
    pub fn distance_to(&self, other: &MovementSample) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A movement event: actor plus their latest sample.
#[derive(Debug, Clone)]
pub struct MovementEvent {
    pub actor: String,
    pub sample: MovementSample,
}

/// Category of an economic transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Transfer,
    Purchase,
    Sale,
    Reward,
    Craft,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Transfer => "transfer",
            TradeKind::Purchase => "purchase",
            TradeKind::Sale => "sale",
            TradeKind::Reward => "reward",
            TradeKind::Craft => "craft",
        }
    }
}

/// A single economic transaction reported by the game layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub actor: String,
    pub kind: TradeKind,
    /// Transaction amount in the smallest currency/resource unit
    pub amount: i64,
    /// The other party, when the transaction has one (transfers)
    pub counterparty: Option<String>,
    /// Resource type, when the transaction generates resources
    pub resource: Option<String>,
    pub at: DateTime<Utc>,
}

/// Request metadata inspected by the frequency detector heuristics.
#[derive(Debug, Clone)]
pub struct RequestProfile {
    /// Client identity (IP or similar)
    pub identity: String,
    pub user_agent: Option<String>,
    pub path: String,
}

/// Classified violation types tracked by the escalation primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Movement faster than the ceiling for its movement type
    Speed,
    /// Transaction amount above the per-kind ceiling
    ExcessiveAmount,
    /// Too many transactions for an (actor, kind) pair per minute
    TradeFrequency,
    /// Repeated back-and-forth transfers between the same two actors
    CircularTrade,
    /// Cumulative resource generation above the theoretical hourly bound
    ResourceGeneration,
    /// Request matched a known-bad user agent or path heuristic
    SuspiciousRequest,
    /// Request frequency above a per-granularity ceiling
    RateFlood,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Speed => "speed",
            ViolationKind::ExcessiveAmount => "excessive_amount",
            ViolationKind::TradeFrequency => "trade_frequency",
            ViolationKind::CircularTrade => "circular_trade",
            ViolationKind::ResourceGeneration => "resource_generation",
            ViolationKind::SuspiciousRequest => "suspicious_request",
            ViolationKind::RateFlood => "rate_flood",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed standing of a client identity, derived from store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// No counters exist for the identity
    Unknown,
    /// Request counters exist, no suspicion recorded
    Normal,
    /// Suspicion counter is non-zero but below the blacklist threshold
    Suspicious,
    /// An active blacklist entry exists
    Blacklisted,
}
