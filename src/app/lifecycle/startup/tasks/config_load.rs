use crate::app::config::ArxConfig;
use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::path::PathBuf;

pub struct ConfigLoadTask {
    path: PathBuf,
}

impl ConfigLoadTask {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl BlockingTask<StartupContext, Error> for ConfigLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = ArxConfig::load(&self.path)
            .map_err(|e| anyhow!("Config load failed ({}): {}", self.path.display(), e))?;

        context
            .config
            .set(config)
            .map_err(|_| anyhow!("Config already set"))?;

        Ok(())
    }
}
