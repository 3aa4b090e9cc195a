use crate::app::pipeline::syncing::r#in::context::SyncInContext;
use crate::core::adapters::AdapterRegistry;
use crate::core::pipeline::BlockingTask;
use crate::core::privacy::gate::{PrivacyConfig, PrivacyDirectives};
use anyhow::{Error, bail};
use std::sync::Arc;

/// Refuses setuid callbacks for unknown bidders, junk uids, and
/// callers whose consent does not cover the bidder
pub struct ValidateSetuidTask {
    registry: Arc<AdapterRegistry>,
    privacy: PrivacyConfig,
}

impl ValidateSetuidTask {
    pub fn new(registry: Arc<AdapterRegistry>, privacy: PrivacyConfig) -> Self {
        Self { registry, privacy }
    }
}

impl BlockingTask<SyncInContext, Error> for ValidateSetuidTask {
    fn run(&self, context: &SyncInContext) -> Result<(), Error> {
        if context.bidder.is_empty() || context.uid.trim().is_empty() {
            bail!("Setuid call missing bidder or uid");
        }

        if context.uid.len() > 256 {
            bail!("Setuid uid value implausibly long");
        }

        let entry = match self.registry.get(&context.bidder) {
            Some(entry) => entry,
            None => bail!("Setuid for unknown bidder {}", context.bidder),
        };

        let directives = PrivacyDirectives::derive_from_signals(
            context.consent.gdpr.as_deref(),
            context.consent.gdpr_consent.as_deref(),
            context.consent.us_privacy.as_deref(),
            &self.privacy,
        );

        if !directives.bidder_allowed(&entry.bidder.info) {
            bail!("Consent does not cover syncing bidder {}", context.bidder);
        }

        Ok(())
    }
}
