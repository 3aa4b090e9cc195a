//! Per-bidder circuit breakers defending the auction path against
//! unreliable upstreams. One breaker per bidder code, shared across
//! workers behind a short mutex hold.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};
use strum::Display;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerPolicy {
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// How long an open breaker rejects before probing
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

struct BreakerCore {
    state: BreakerState,
    consecutive_failures: u32,
    successes: u64,
    opened_at: Option<Instant>,
    /// Set while the single half-open probe is in flight
    probe_out: bool,
}

impl BreakerCore {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            successes: 0,
            opened_at: None,
            probe_out: false,
        }
    }
}

/// One bidder's breaker. A 204 no-bid counts as success; failure is
/// any non-2xx/204 status, connection error, or parse error.
pub struct Breaker {
    core: Mutex<BreakerCore>,
    policy: BreakerPolicy,
}

impl Breaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            core: Mutex::new(BreakerCore::new()),
            policy,
        }
    }

    /// Checks whether a callout may go out right now. Open breakers
    /// short-circuit, except for the one half-open probe permitted
    /// once the cooldown has elapsed.
    pub fn allow(&self) -> bool {
        let mut core = self.core.lock();

        match core.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                // only one probe at a time
                if core.probe_out {
                    return false;
                }
                core.probe_out = true;
                true
            }
            BreakerState::Open => {
                let elapsed = core
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);

                if elapsed < self.policy.cooldown {
                    return false;
                }

                core.state = BreakerState::HalfOpen;
                core.probe_out = true;
                debug!("Breaker cooldown elapsed, allowing half-open probe");
                true
            }
        }
    }

    pub fn record_success(&self) {
        let mut core = self.core.lock();

        core.successes += 1;
        core.consecutive_failures = 0;
        core.probe_out = false;

        if core.state != BreakerState::Closed {
            info!("Breaker closing after successful probe");
            core.state = BreakerState::Closed;
            core.opened_at = None;
        }
    }

    pub fn record_failure(&self) {
        let mut core = self.core.lock();

        core.consecutive_failures += 1;
        core.probe_out = false;

        match core.state {
            BreakerState::HalfOpen => {
                warn!("Half-open probe failed, re-opening breaker");
                core.state = BreakerState::Open;
                core.opened_at = Some(Instant::now());
            }
            BreakerState::Closed => {
                if core.consecutive_failures >= self.policy.failure_threshold {
                    warn!(
                        "Breaker opening after {} consecutive failures",
                        core.consecutive_failures
                    );
                    core.state = BreakerState::Open;
                    core.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.core.lock().state
    }

    /// Test/ops hook to force a breaker open
    pub fn trip(&self) {
        let mut core = self.core.lock();
        core.state = BreakerState::Open;
        core.opened_at = Some(Instant::now());
    }
}

/// Registry of breakers keyed by bidder code. Entries are created on
/// first use so newly configured bidders need no registration step.
pub struct BreakerBoard {
    breakers: DashMap<String, Breaker, ahash::RandomState>,
    policy: BreakerPolicy,
}

impl BreakerBoard {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            breakers: DashMap::default(),
            policy,
        }
    }

    pub fn allow(&self, bidder: &str) -> bool {
        self.entry(bidder, |b| b.allow())
    }

    pub fn record_success(&self, bidder: &str) {
        self.entry(bidder, |b| b.record_success());
    }

    pub fn record_failure(&self, bidder: &str) {
        self.entry(bidder, |b| b.record_failure());
    }

    pub fn state(&self, bidder: &str) -> BreakerState {
        self.entry(bidder, |b| b.state())
    }

    pub fn trip(&self, bidder: &str) {
        self.entry(bidder, |b| b.trip());
    }

    fn entry<R>(&self, bidder: &str, f: impl FnOnce(&Breaker) -> R) -> R {
        if let Some(breaker) = self.breakers.get(bidder) {
            return f(&breaker);
        }

        let breaker = self
            .breakers
            .entry(bidder.to_string())
            .or_insert_with(|| Breaker::new(self.policy.clone()));

        f(&breaker)
    }
}
