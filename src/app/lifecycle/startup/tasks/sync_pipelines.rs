use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::syncing::out::build_sync_out_pipeline;
use crate::app::pipeline::syncing::r#in::build_sync_in_pipeline;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::sync::Arc;

pub struct BuildSyncPipelinesTask;

impl BlockingTask<StartupContext, Error> for BuildSyncPipelinesTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let out_pipeline = build_sync_out_pipeline(context)?;
        let in_pipeline = build_sync_in_pipeline(context)?;

        context
            .sync_out_pipeline
            .set(Arc::new(out_pipeline))
            .map_err(|_| anyhow!("Sync out pipeline already set"))?;

        context
            .sync_in_pipeline
            .set(Arc::new(in_pipeline))
            .map_err(|_| anyhow!("Sync in pipeline already set"))?;

        Ok(())
    }
}
