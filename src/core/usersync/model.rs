use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One stored pairing of our first-party ID with a partner's own UID.
/// Primary key is (fpid, bidder code); an upsert with a new UID is a
/// rotation and simply replaces the old value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncEntry {
    /// The partner's UID for this user, e.g. a DSP buyeruid
    pub uid: String,
    /// Hard expiry, epoch seconds
    pub expires_at: u64,
    /// Last time the entry was injected into an auction, for
    /// staleness cleanup
    pub last_used: u64,
}

impl SyncEntry {
    pub fn new(uid: String, expires_at: u64) -> SyncEntry {
        Self {
            uid,
            expires_at,
            last_used: epoch_seconds(),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}
