//! Limit keys and the store key namespace
//!
//! Every counter in the shared store is addressed by a string key built
//! from a scope prefix, an identity, and (where needed) a sub-dimension.
//! Prefixes are distinct per concern so unrelated policies can never
//! collide on a key.

use uuid::Uuid;

/// Key namespace prefixes, one per concern.
pub mod prefix {
    /// Sliding-window rate limit counters
    pub const WINDOW: &str = "rl:win";
    /// Token bucket state
    pub const BUCKET: &str = "rl:bucket";
    /// One-time nonce records
    pub const NONCE: &str = "nonce";
    /// Blacklist entries
    pub const BLACKLIST: &str = "bl";
    /// Suspicion / violation counters
    pub const SUSPICION: &str = "susp";
    /// Frequency detector counters
    pub const FREQUENCY: &str = "freq";
    /// Movement state (last known position)
    pub const MOVEMENT: &str = "cheat";
    /// Economic counters
    pub const ECONOMY: &str = "econ";
    /// Investigation flags written on escalation
    pub const FLAG: &str = "flag";
}

/// Key used to identify a rate limit subject
///
/// Mirrors the `limit_type` of a declarative policy: the calling layer
/// resolves its key expression into one of these concrete variants before
/// invoking the engine. The engine never parses expressions itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LimitKey {
    /// Rate limit by client IP address
    Ip(String),
    /// Rate limit by player id
    Player(Uuid),
    /// Rate limit by API operation name
    Api(String),
    /// Caller-resolved custom dimension
    Custom(String),
}

impl LimitKey {
    /// Convert to a store-compatible key string under the given prefix.
    pub fn to_store_key(&self, prefix: &str) -> String {
        match self {
            LimitKey::Ip(ip) => format!("{}:ip:{}", prefix, ip),
            LimitKey::Player(id) => format!("{}:player:{}", prefix, id),
            LimitKey::Api(op) => format!("{}:api:{}", prefix, op),
            LimitKey::Custom(dim) => format!("{}:custom:{}", prefix, dim),
        }
    }

    /// Scope name for logging and telemetry.
    pub fn scope(&self) -> &'static str {
        match self {
            LimitKey::Ip(_) => "ip",
            LimitKey::Player(_) => "player",
            LimitKey::Api(_) => "api",
            LimitKey::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Display for LimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKey::Ip(ip) => write!(f, "ip:{}", ip),
            LimitKey::Player(id) => write!(f, "player:{}", id),
            LimitKey::Api(op) => write!(f, "api:{}", op),
            LimitKey::Custom(dim) => write!(f, "custom:{}", dim),
        }
    }
}
