use dashmap::DashMap;
use std::time::Instant;

#[derive(Debug, Clone)]
struct WinCounter {
    wins: u64,
    revenue: f64,
    last_win: Instant,
}

/// Rolling per-bidder win tally, fed by win events and consumed by
/// cookie-sync selection to prefer demand that actually pays
pub struct WinStats {
    counters: DashMap<String, WinCounter, ahash::RandomState>,
}

impl WinStats {
    pub fn new() -> Self {
        Self {
            counters: DashMap::default(),
        }
    }

    pub fn record_win(&self, bidder: &str, price: f64) {
        self.counters
            .entry(bidder.to_string())
            .and_modify(|c| {
                c.wins += 1;
                c.revenue += price;
                c.last_win = Instant::now();
            })
            .or_insert(WinCounter {
                wins: 1,
                revenue: price,
                last_win: Instant::now(),
            });
    }

    /// Sort key for sync preference: lifetime revenue. Bidders never
    /// seen score zero and fall back to name ordering.
    pub fn score(&self, bidder: &str) -> f64 {
        self.counters.get(bidder).map(|c| c.revenue).unwrap_or(0.0)
    }

    pub fn wins(&self, bidder: &str) -> u64 {
        self.counters.get(bidder).map(|c| c.wins).unwrap_or(0)
    }
}

impl Default for WinStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_accumulates() {
        let stats = WinStats::new();

        stats.record_win("dsp-a", 1.5);
        stats.record_win("dsp-a", 2.5);
        stats.record_win("dsp-b", 0.5);

        assert_eq!(stats.wins("dsp-a"), 2);
        assert!(stats.score("dsp-a") > stats.score("dsp-b"));
        assert_eq!(stats.score("unseen"), 0.0);
    }
}
