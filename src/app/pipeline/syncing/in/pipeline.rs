use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::syncing::r#in::context::SyncInContext;
use crate::app::pipeline::syncing::r#in::tasks;
use crate::core::pipeline::{Pipeline, PipelineBuilder};
use anyhow::{Error, anyhow, bail};

/// Builds the pipeline behind `/setuid`: validate the callback, then
/// host the (fpid, bidder) -> uid match table entry
pub fn build_sync_in_pipeline(
    context: &StartupContext,
) -> Result<Pipeline<SyncInContext, Error>, Error> {
    let config = context
        .config
        .get()
        .ok_or_else(|| anyhow!("Config not set when building setuid pipeline"))?;

    let registry = match context.registry.get() {
        Some(registry) => registry,
        None => bail!("No adapter registry?! Cant build setuid pipeline"),
    };

    let store = context
        .sync_store
        .get()
        .ok_or_else(|| anyhow!("No sync store on context"))?;

    let pipeline = PipelineBuilder::new()
        .with_blocking(Box::new(tasks::ValidateSetuidTask::new(
            registry.clone(),
            config.privacy.clone(),
        )))
        .with_async(Box::new(tasks::StoreUidTask::new(
            store.clone(),
            config.sync.entry_ttl,
        )))
        .build()
        .expect("Sync in pipeline should have tasks");

    Ok(pipeline)
}
