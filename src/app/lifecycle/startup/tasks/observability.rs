use crate::app::lifecycle::context::StartupContext;
use crate::core::observability::provider;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};

pub struct ConfigureObservabilityTask;

impl BlockingTask<StartupContext, Error> for ConfigureObservabilityTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while configuring observability"),
        };

        let guards = provider::init_logging(&config.logging)?;

        context
            .observability
            .set(guards)
            .map_err(|_| anyhow!("Observability already configured"))?;

        Ok(())
    }
}
