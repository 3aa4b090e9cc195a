use crate::app::pipeline::syncing::out::context::{
    SyncBidderEntry, SyncMethod, SyncOutContext, SyncOutResponse,
};
use crate::core::adapters::AdapterRegistry;
use crate::core::managers::WinStats;
use crate::core::pipeline::AsyncTask;
use crate::core::usersync::{SyncStore, selection};
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Chooses the bidders the caller should sync next and renders the
/// endpoint response. Bidders already holding a live sync entry for
/// this user are skipped.
pub struct BuildSyncResponseTask {
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn SyncStore>,
    win_stats: Arc<WinStats>,
    max_syncs: usize,
}

impl BuildSyncResponseTask {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn SyncStore>,
        win_stats: Arc<WinStats>,
        max_syncs: usize,
    ) -> Self {
        Self {
            registry,
            store,
            win_stats,
            max_syncs,
        }
    }
}

#[async_trait]
impl AsyncTask<SyncOutContext, Error> for BuildSyncResponseTask {
    async fn run(&self, context: &SyncOutContext) -> Result<(), Error> {
        let fpid = context
            .fpid
            .get()
            .ok_or_else(|| anyhow!("Fpid not set, cannot build sync response"))?;

        let privacy = context
            .privacy
            .get()
            .ok_or_else(|| anyhow!("No privacy directives on sync context"))?;

        let already_synced: HashSet<String> =
            self.store.get_all(fpid).await.into_keys().collect();

        let chosen = selection::choose_bidders(
            &self.registry,
            &self.win_stats,
            privacy,
            fpid,
            &already_synced,
            self.max_syncs,
        );

        debug!("Selected {} bidders for syncing", chosen.len());

        let bidders = chosen
            .into_iter()
            .map(|candidate| SyncBidderEntry {
                bidder: candidate.entry.bidder.code.clone(),
                usersync: SyncMethod {
                    url: candidate.url,
                    kind: candidate
                        .entry
                        .bidder
                        .usersync
                        .as_ref()
                        .map(|s| s.kind)
                        .unwrap_or_default(),
                },
            })
            .collect();

        if context
            .response
            .set(SyncOutResponse {
                status: "ok",
                bidders,
            })
            .is_err()
        {
            bail!("Sync response already assigned");
        }

        Ok(())
    }
}
