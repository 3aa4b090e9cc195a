use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::AsyncTask;
use crate::core::usersync::{LocalStore, NoopStore, SyncStore};
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Maintenance cadence for expired/stale sync entry cleanup
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(3600);

pub struct SyncStoreInitTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for SyncStoreInitTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while initializing sync store"),
        };

        let store: Arc<dyn SyncStore> = if config.sync.enabled {
            Arc::new(LocalStore::new(config.sync.user_ttl))
        } else {
            info!("User syncing disabled, using noop store");
            Arc::new(NoopStore)
        };

        if config.sync.enabled {
            let maintenance = store.clone();
            let stale_after = config.sync.stale_after;

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                loop {
                    ticker.tick().await;
                    maintenance.delete_expired().await;
                    maintenance.delete_stale(stale_after).await;
                }
            });
        }

        context
            .sync_store
            .set(store)
            .map_err(|_| anyhow!("Sync store already set"))?;

        Ok(())
    }
}
