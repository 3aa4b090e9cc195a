use crate::app::lifecycle::context::StartupContext;
use crate::core::auth::AuthGuard;
use crate::core::breaker::BreakerBoard;
use crate::core::filters::IvtFilter;
use crate::core::managers::WinStats;
use crate::core::pipeline::BlockingTask;
use crate::core::ratelimit::AdmissionLimiters;
use anyhow::{Error, anyhow, bail};
use std::sync::Arc;

/// Wires the small shared services: circuit breakers, win stats,
/// admission limiters, auth, and the ivt filter
pub struct ServicesInitTask;

impl BlockingTask<StartupContext, Error> for ServicesInitTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while initializing services"),
        };

        context
            .breakers
            .set(Arc::new(BreakerBoard::new(config.breaker.clone())))
            .map_err(|_| anyhow!("Breakers already set"))?;

        context
            .win_stats
            .set(Arc::new(WinStats::new()))
            .map_err(|_| anyhow!("Win stats already set"))?;

        context
            .limiters
            .set(Arc::new(AdmissionLimiters::new(&config.rate_limit)))
            .map_err(|_| anyhow!("Limiters already set"))?;

        context
            .auth
            .set(Arc::new(AuthGuard::new(config.auth.clone())))
            .map_err(|_| anyhow!("Auth guard already set"))?;

        *context.ivt_filter.lock() = Some(IvtFilter::new(config.ivt.clone()));

        Ok(())
    }
}
