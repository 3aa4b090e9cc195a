use crate::app::pipeline::syncing::r#in::context::SyncInContext;
use crate::core::pipeline::AsyncTask;
use crate::core::usersync::model::epoch_seconds;
use crate::core::usersync::{SyncStore, constants, utils};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Upserts the partner's uid under the caller's fpid. A changed uid
/// is a rotation and simply replaces the old entry.
pub struct StoreUidTask {
    store: Arc<dyn SyncStore>,
    entry_ttl: Duration,
}

impl StoreUidTask {
    pub fn new(store: Arc<dyn SyncStore>, entry_ttl: Duration) -> Self {
        Self { store, entry_ttl }
    }
}

#[async_trait]
impl AsyncTask<SyncInContext, Error> for StoreUidTask {
    async fn run(&self, context: &SyncInContext) -> Result<(), Error> {
        let existing = context
            .cookies
            .get(constants::CONST_ARX_FPID_COOKIE)
            .filter(|fpid| utils::validate_fpid(fpid));

        let fpid = match existing {
            Some(fpid) => fpid.clone(),
            None => {
                context.minted.set(()).ok();
                utils::generate_fpid()
            }
        };

        let expires_at = epoch_seconds() + self.entry_ttl.as_secs();

        let replaced = self
            .store
            .upsert(&fpid, &context.bidder, context.uid.clone(), expires_at)
            .await;

        debug!(
            "Stored uid for bidder {} (rotation: {})",
            context.bidder,
            replaced.is_some()
        );

        context.rotated.set(replaced.is_some()).ok();

        context
            .fpid
            .set(fpid)
            .map_err(|_| anyhow!("Fpid already set on setuid context"))?;

        Ok(())
    }
}
