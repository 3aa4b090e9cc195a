//! Request-admission rate limiting. Token buckets sit in front of
//! enrichment; once a request is admitted the auction runs on its own
//! deadline with no further internal queuing.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests/sec across auxiliary paths, 0 disables
    pub general: u32,
    /// Requests/sec on the auction path, 0 disables
    pub auction: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general: 0,
            auction: 0,
        }
    }
}

pub struct AdmissionLimiters {
    general: Option<DefaultDirectRateLimiter>,
    auction: Option<DefaultDirectRateLimiter>,
}

fn build(limit: u32) -> Option<DefaultDirectRateLimiter> {
    NonZeroU32::new(limit).map(|per_sec| RateLimiter::direct(Quota::per_second(per_sec)))
}

impl AdmissionLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            general: build(config.general),
            auction: build(config.auction),
        }
    }

    pub fn admit_general(&self) -> bool {
        self.general.as_ref().map(|rl| rl.check().is_ok()).unwrap_or(true)
    }

    pub fn admit_auction(&self) -> bool {
        self.auction.as_ref().map(|rl| rl.check().is_ok()).unwrap_or(true)
    }
}
