use crate::app::lifecycle::context::StartupContext;
use crate::core::enrichment::GeoLookup;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};
use std::sync::Arc;
use tracing::info;

/// Loads the geo table when one is configured. No table just means
/// the enrichment stage is skipped.
pub struct GeoLookupLoadTask;

impl BlockingTask<StartupContext, Error> for GeoLookupLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while loading geo table"),
        };

        let lookup = match &config.geo.db_path {
            Some(path) => {
                let lookup = GeoLookup::load(path)?;
                Some(Arc::new(lookup))
            }
            None => {
                info!("No geo table configured, geo enrichment disabled");
                None
            }
        };

        context
            .geo_lookup
            .set(lookup)
            .map_err(|_| anyhow!("Geo lookup already set"))?;

        Ok(())
    }
}
