use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::pipeline::AsyncTask;
use crate::core::usersync::SyncStore;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Prefetches the user's per-bidder UIDs from the sync store so
/// bidder matching can stamp each callout's buyeruid. Consent-aware:
/// when the gate denies a bidder, its UID never leaves the store.
pub struct IdentityDemandTask {
    store: Arc<dyn SyncStore>,
}

impl IdentityDemandTask {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let fpid = match &context.fpid {
            Some(fpid) => fpid.clone(),
            None => {
                context
                    .sync_uids
                    .set(Default::default())
                    .map_err(|_| anyhow!("Sync uids already set"))?;
                return Ok(());
            }
        };

        let uids = self.store.get_all(&fpid).await;

        debug!("Prefetched {} sync uids for user", uids.len());

        for bidder in uids.keys() {
            self.store.mark_used(&fpid, bidder).await;
        }

        context
            .sync_uids
            .set(uids)
            .map_err(|_| anyhow!("Sync uids already set"))?;

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for IdentityDemandTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("identity_demand_task");

        self.run0(context).instrument(span).await
    }
}
