//! Cookie-sync selection: given who the user is and what consent we
//! hold, pick which bidders to sync next.

use crate::core::adapters::registry::{AdapterRegistry, RegisteredBidder};
use crate::core::managers::winstats::WinStats;
use crate::core::privacy::PrivacyDirectives;
use std::collections::HashSet;
use tracing::debug;

pub struct SyncCandidate<'a> {
    pub entry: &'a RegisteredBidder,
    /// The partner sync url with our fpid substituted in
    pub url: String,
}

/// Chooses up to `max_syncs` bidders to sync, in preference order.
///
/// Rules, in order:
/// * a bidder failing the consent check never syncs
/// * bidders already synced (store entry or cookie) are skipped
/// * preference goes to bidders with recent high-value wins, then
///   lexicographic bidder code for a stable ordering
pub fn choose_bidders<'a>(
    registry: &'a AdapterRegistry,
    win_stats: &WinStats,
    privacy: &PrivacyDirectives,
    fpid: &str,
    already_synced: &HashSet<String>,
    max_syncs: usize,
) -> Vec<SyncCandidate<'a>> {
    let mut candidates: Vec<&RegisteredBidder> = registry
        .list()
        .filter(|entry| entry.bidder.info.enabled)
        .filter(|entry| entry.bidder.usersync.is_some())
        .filter(|entry| {
            if already_synced.contains(&entry.bidder.code) {
                debug!("Skipping already synced bidder {}", entry.bidder.code);
                return false;
            }
            true
        })
        .filter(|entry| privacy.bidder_allowed(&entry.bidder.info))
        .collect();

    candidates.sort_by(|a, b| {
        let score_a = win_stats.score(&a.bidder.code);
        let score_b = win_stats.score(&b.bidder.code);

        score_b
            .total_cmp(&score_a)
            .then_with(|| a.bidder.code.cmp(&b.bidder.code))
    });

    candidates
        .into_iter()
        .take(max_syncs)
        .map(|entry| {
            let template = &entry
                .bidder
                .usersync
                .as_ref()
                .expect("filtered to bidders with usersync")
                .url;

            SyncCandidate {
                entry,
                url: super::utils::fill_sync_url(template, fpid),
            }
        })
        .collect()
}
