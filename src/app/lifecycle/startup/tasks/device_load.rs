use crate::app::lifecycle::context::StartupContext;
use crate::core::enrichment::DeviceLookup;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::info;

pub struct DeviceLookupLoadTask;

impl BlockingTask<StartupContext, Error> for DeviceLookupLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while loading device lookup"),
        };

        let cache_sz = NonZeroU32::new(config.caches.cache_device_sz)
            .ok_or_else(|| anyhow!("Device cache size cannot be zero"))?;

        let lookup = DeviceLookup::try_new(cache_sz)?;

        info!("Device lookup initialized");

        context
            .device_lookup
            .set(Arc::new(lookup))
            .map_err(|_| anyhow!("Device lookup already set"))?;

        Ok(())
    }
}
