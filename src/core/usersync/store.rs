use crate::core::usersync::model::SyncEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Backend holding the fpid -> per-bidder UID match table.
///
/// A disabled backend is modeled by ['super::NoopStore'] rather than
/// an Option at every call site: reads come back empty, writes
/// succeed, nothing persists.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Stores or rotates the UID for (fpid, bidder). Returns the
    /// replaced entry when this was a rotation.
    async fn upsert(
        &self,
        fpid: &str,
        bidder: &str,
        uid: String,
        expires_at: u64,
    ) -> Option<SyncEntry>;

    /// All non-expired entries for a user, keyed by bidder code
    async fn get_all(&self, fpid: &str) -> HashMap<String, SyncEntry>;

    /// Bumps last_used for staleness tracking
    async fn mark_used(&self, fpid: &str, bidder: &str);

    /// Drops entries past their hard expiry
    async fn delete_expired(&self);

    /// Drops entries unused for longer than the cutoff
    async fn delete_stale(&self, older_than: Duration);
}
