use crate::app::lifecycle::context::StartupContext;
use crate::core::adapters::{AdapterRegistry, BidderAdapter, StandardAdapter};
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};
use std::sync::Arc;
use tracing::info;

/// Builds the adapter registry from the configured bidders. All
/// registration is explicit and happens exactly once, here.
pub struct AdaptersLoadTask;

impl BlockingTask<StartupContext, Error> for AdaptersLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while loading adapters"),
        };

        let standard: Arc<dyn BidderAdapter> = Arc::new(StandardAdapter);

        let entries = config
            .bidders
            .iter()
            .cloned()
            .map(|bidder| (bidder, standard.clone()))
            .collect();

        let registry = AdapterRegistry::build(entries);

        info!("Adapter registry holds {} bidders", registry.len());

        context
            .registry
            .set(Arc::new(registry))
            .map_err(|_| anyhow!("Registry already set"))?;

        Ok(())
    }
}
