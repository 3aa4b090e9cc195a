use crate::app::pipeline::syncing::out::context::SyncOutContext;
use crate::core::pipeline::BlockingTask;
use crate::core::privacy::gate::{PrivacyConfig, PrivacyDirectives};
use anyhow::{Error, anyhow};

pub struct ParseSyncConsentTask {
    config: PrivacyConfig,
}

impl ParseSyncConsentTask {
    pub fn new(config: PrivacyConfig) -> Self {
        Self { config }
    }
}

impl BlockingTask<SyncOutContext, Error> for ParseSyncConsentTask {
    fn run(&self, context: &SyncOutContext) -> Result<(), Error> {
        let directives = PrivacyDirectives::derive_from_signals(
            context.params.gdpr.as_deref(),
            context.params.gdpr_consent.as_deref(),
            context.params.us_privacy.as_deref(),
            &self.config,
        );

        context
            .privacy
            .set(directives)
            .map_err(|_| anyhow!("Privacy directives already set on sync context"))?;

        Ok(())
    }
}
