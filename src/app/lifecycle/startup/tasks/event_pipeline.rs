use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::events::win::build_win_event_pipeline;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::sync::Arc;

pub struct BuildWinEventPipelineTask;

impl BlockingTask<StartupContext, Error> for BuildWinEventPipelineTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let pipeline = build_win_event_pipeline(context)?;

        context
            .win_event_pipeline
            .set(Arc::new(pipeline))
            .map_err(|_| anyhow!("Win event pipeline already set"))?;

        Ok(())
    }
}
