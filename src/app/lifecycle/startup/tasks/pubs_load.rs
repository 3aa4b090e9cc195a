use crate::app::lifecycle::context::StartupContext;
use crate::core::managers::PublisherManager;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};
use std::sync::Arc;
use tracing::info;

pub struct PubsLoadTask;

impl BlockingTask<StartupContext, Error> for PubsLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while loading publishers"),
        };

        let manager = PublisherManager::build(config.publishers.clone());

        info!("Publisher manager holds {} publishers", manager.len());

        context
            .publishers
            .set(Arc::new(manager))
            .map_err(|_| anyhow!("Publisher manager already set"))?;

        Ok(())
    }
}
