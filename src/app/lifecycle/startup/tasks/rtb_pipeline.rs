use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::ortb::build_auction_pipeline;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::sync::Arc;

pub struct BuildRtbPipelineTask;

impl BlockingTask<StartupContext, Error> for BuildRtbPipelineTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let pipeline = build_auction_pipeline(context)?;

        context
            .auction_pipeline
            .set(Arc::new(pipeline))
            .map_err(|_| anyhow!("Auction pipeline already set"))?;

        Ok(())
    }
}
