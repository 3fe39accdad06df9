//! Time-bounded denylist of client identities
//!
//! Consulted before any other check. Entries auto-expire; renewing an
//! entry may extend its expiry but never shortens it. Removal is the
//! operator override that returns an identity to the Unknown state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::errors::StoreError;
use crate::domain::keys::prefix;
use crate::infrastructure::store::CounterStore;

/// One denylist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub identity: String,
    pub reason: String,
    /// Unix seconds
    pub added_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

/// Denylist over the shared store.
pub struct Blacklist {
    store: Arc<dyn CounterStore>,
    key_prefix: String,
}

impl Blacklist {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            key_prefix: prefix::BLACKLIST.to_string(),
        }
    }

    /// Hash the untrusted identity into a fixed-length store key.
    fn entry_key(&self, identity: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        format!("{}:{}", self.key_prefix, hex::encode(hasher.finalize()))
    }

    /// Add or renew an entry. An existing later expiry is kept; the TTL is
    /// never shortened by a renewal.
    pub async fn insert(
        &self,
        identity: &str,
        reason: &str,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        let mut expires_at = now + ttl_secs as i64;

        if let Ok(Some(existing)) = self.info(identity).await
            && existing.expires_at > expires_at
        {
            expires_at = existing.expires_at;
        }

        let entry = BlacklistEntry {
            identity: identity.to_string(),
            reason: reason.to_string(),
            added_at: now,
            expires_at,
        };

        let key = self.entry_key(identity);
        let payload = serde_json::to_string(&entry)?;
        self.store
            .set_raw(&key, &payload, (expires_at - now).max(1) as u64)
            .await?;

        info!(
            identity = %identity,
            reason = %reason,
            expires_at = expires_at,
            "Identity blacklisted"
        );
        Ok(())
    }

    /// Active entry for an identity, if any.
    pub async fn info(&self, identity: &str) -> Result<Option<BlacklistEntry>, StoreError> {
        let key = self.entry_key(identity);

        let Some(payload) = self.store.get_raw(&key).await? else {
            return Ok(None);
        };

        let entry: BlacklistEntry = serde_json::from_str(&payload)?;

        // The store TTL should have removed this already; treat a lingering
        // expired entry as absent rather than rejecting on it.
        if entry.expires_at <= Utc::now().timestamp() {
            debug!(identity = %identity, "Ignoring expired blacklist entry");
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Fail-open check used on the admission path: a store failure reports
    /// "not blacklisted" and logs.
    pub async fn check(&self, identity: &str) -> Option<BlacklistEntry> {
        match self.info(identity).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(identity = %identity, "Blacklist check failed open: {}", e);
                None
            }
        }
    }

    /// Operator override: remove an identity immediately.
    pub async fn remove(&self, identity: &str) -> Result<(), StoreError> {
        let key = self.entry_key(identity);
        self.store.delete(&key).await?;
        info!(identity = %identity, "Identity removed from blacklist by operator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::InMemoryCounterStore;

    fn blacklist() -> Blacklist {
        Blacklist::new(Arc::new(InMemoryCounterStore::new()))
    }

    #[tokio::test]
    async fn test_insert_and_info() {
        let bl = blacklist();

        bl.insert("203.0.113.5", "request flood", 600).await.unwrap();

        let entry = bl.info("203.0.113.5").await.unwrap().unwrap();
        assert_eq!(entry.identity, "203.0.113.5");
        assert_eq!(entry.reason, "request flood");
        assert!(entry.expires_at > entry.added_at);

        assert!(bl.info("203.0.113.6").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_renewal_never_shortens_ttl() {
        let bl = blacklist();

        bl.insert("1.2.3.4", "flood", 3600).await.unwrap();
        let first = bl.info("1.2.3.4").await.unwrap().unwrap();

        // A shorter renewal keeps the original expiry
        bl.insert("1.2.3.4", "heuristic", 60).await.unwrap();
        let second = bl.info("1.2.3.4").await.unwrap().unwrap();
        assert_eq!(second.expires_at, first.expires_at);
        assert_eq!(second.reason, "heuristic");

        // A longer renewal extends it
        bl.insert("1.2.3.4", "flood again", 7200).await.unwrap();
        let third = bl.info("1.2.3.4").await.unwrap().unwrap();
        assert!(third.expires_at > first.expires_at);
    }

    #[tokio::test]
    async fn test_remove_is_immediate() {
        let bl = blacklist();

        bl.insert("bad-actor", "cheating", 600).await.unwrap();
        assert!(bl.check("bad-actor").await.is_some());

        bl.remove("bad-actor").await.unwrap();
        assert!(bl.check("bad-actor").await.is_none());
    }

    #[tokio::test]
    async fn test_check_is_none_for_unknown_identity() {
        let bl = blacklist();
        assert!(bl.check("nobody").await.is_none());
    }
}
