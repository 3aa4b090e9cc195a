use crate::core::usersync::model::{SyncEntry, epoch_seconds};
use crate::core::usersync::store::SyncStore;
use async_trait::async_trait;
use moka::sync::{Cache, CacheBuilder};
use std::collections::HashMap;
use std::time::Duration;

/// In-process sync store: fpid -> map<bidder code, entry>, bounded
/// by a TTL so abandoned users age out on their own
pub struct LocalStore {
    cache: Cache<String, HashMap<String, SyncEntry>>,
}

impl LocalStore {
    pub fn new(user_ttl: Duration) -> Self {
        Self {
            cache: CacheBuilder::default().time_to_live(user_ttl).build(),
        }
    }
}

#[async_trait]
impl SyncStore for LocalStore {
    async fn upsert(
        &self,
        fpid: &str,
        bidder: &str,
        uid: String,
        expires_at: u64,
    ) -> Option<SyncEntry> {
        let mut entries = self.cache.get(fpid).unwrap_or_default();

        let replaced = entries.insert(bidder.to_string(), SyncEntry::new(uid, expires_at));

        self.cache.insert(fpid.to_string(), entries);

        replaced
    }

    async fn get_all(&self, fpid: &str) -> HashMap<String, SyncEntry> {
        let now = epoch_seconds();

        self.cache
            .get(fpid)
            .map(|entries| {
                entries
                    .into_iter()
                    .filter(|(_, e)| !e.is_expired(now))
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn mark_used(&self, fpid: &str, bidder: &str) {
        let mut entries = match self.cache.get(fpid) {
            Some(entries) => entries,
            None => return,
        };

        if let Some(entry) = entries.get_mut(bidder) {
            entry.last_used = epoch_seconds();
            self.cache.insert(fpid.to_string(), entries);
        }
    }

    async fn delete_expired(&self) {
        let now = epoch_seconds();

        // iterate a snapshot; moka handles concurrent mutation
        for (fpid, entries) in self.cache.iter() {
            let kept: HashMap<String, SyncEntry> = entries
                .iter()
                .filter(|(_, e)| !e.is_expired(now))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            if kept.len() != entries.len() {
                if kept.is_empty() {
                    self.cache.invalidate(fpid.as_str());
                } else {
                    self.cache.insert(fpid.to_string(), kept);
                }
            }
        }
    }

    async fn delete_stale(&self, older_than: Duration) {
        let cutoff = epoch_seconds().saturating_sub(older_than.as_secs());

        for (fpid, entries) in self.cache.iter() {
            let kept: HashMap<String, SyncEntry> = entries
                .iter()
                .filter(|(_, e)| e.last_used >= cutoff)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            if kept.len() != entries.len() {
                if kept.is_empty() {
                    self.cache.invalidate(fpid.as_str());
                } else {
                    self.cache.insert(fpid.to_string(), kept);
                }
            }
        }
    }
}

/// The disabled backend: reads empty, writes succeed
pub struct NoopStore;

#[async_trait]
impl SyncStore for NoopStore {
    async fn upsert(&self, _: &str, _: &str, _: String, _: u64) -> Option<SyncEntry> {
        None
    }

    async fn get_all(&self, _: &str) -> HashMap<String, SyncEntry> {
        HashMap::new()
    }

    async fn mark_used(&self, _: &str, _: &str) {}

    async fn delete_expired(&self) {}

    async fn delete_stale(&self, _: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_read_back() {
        let store = LocalStore::new(Duration::from_secs(3600));

        let replaced = store
            .upsert("ax-1", "dsp-a", "uid-1".to_string(), epoch_seconds() + 60)
            .await;
        assert!(replaced.is_none());

        let all = store.get_all("ax-1").await;
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("dsp-a").unwrap().uid, "uid-1");
    }

    #[tokio::test]
    async fn rotation_returns_the_replaced_entry() {
        let store = LocalStore::new(Duration::from_secs(3600));
        let expiry = epoch_seconds() + 60;

        store
            .upsert("ax-1", "dsp-a", "old".to_string(), expiry)
            .await;
        let replaced = store
            .upsert("ax-1", "dsp-a", "new".to_string(), expiry)
            .await;

        assert_eq!(replaced.unwrap().uid, "old");
        assert_eq!(store.get_all("ax-1").await.get("dsp-a").unwrap().uid, "new");
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_collectable() {
        let store = LocalStore::new(Duration::from_secs(3600));

        store
            .upsert("ax-1", "gone", "u".to_string(), epoch_seconds() - 1)
            .await;
        store
            .upsert("ax-1", "live", "u".to_string(), epoch_seconds() + 60)
            .await;

        let all = store.get_all("ax-1").await;
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("live"));

        store.delete_expired().await;
        store.cache.run_pending_tasks();

        let remaining = store.cache.get("ax-1").unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn noop_store_swallows_everything() {
        let store = NoopStore;

        store.upsert("a", "b", "c".to_string(), u64::MAX).await;
        assert!(store.get_all("a").await.is_empty());
    }
}
