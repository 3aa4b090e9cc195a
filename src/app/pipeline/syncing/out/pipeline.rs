use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::syncing::out::context::SyncOutContext;
use crate::app::pipeline::syncing::out::tasks;
use crate::core::pipeline::{Pipeline, PipelineBuilder};
use anyhow::{Error, anyhow, bail};

/// Builds the pipeline behind `/cookie_sync`: resolve the caller's
/// first-party ID, read their consent signals, and pick which bidders
/// to sync next
pub fn build_sync_out_pipeline(
    context: &StartupContext,
) -> Result<Pipeline<SyncOutContext, Error>, Error> {
    let config = context
        .config
        .get()
        .ok_or_else(|| anyhow!("Config not set when building sync pipeline"))?;

    let registry = match context.registry.get() {
        Some(registry) => registry,
        None => bail!("No adapter registry?! Cant build sync pipeline"),
    };

    let store = context
        .sync_store
        .get()
        .ok_or_else(|| anyhow!("No sync store on context"))?;

    let win_stats = context
        .win_stats
        .get()
        .ok_or_else(|| anyhow!("No win stats on context"))?;

    let pipeline = PipelineBuilder::new()
        .with_blocking(Box::new(tasks::ExtractFpidTask))
        .with_blocking(Box::new(tasks::ParseSyncConsentTask::new(
            config.privacy.clone(),
        )))
        .with_async(Box::new(tasks::BuildSyncResponseTask::new(
            registry.clone(),
            store.clone(),
            win_stats.clone(),
            config.sync.max_syncs,
        )))
        .build()
        .expect("Sync out pipeline should have tasks");

    Ok(pipeline)
}
