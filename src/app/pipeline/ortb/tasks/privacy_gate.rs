use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::ortb::BidResponseState;
use crate::core::pipeline::BlockingTask;
use crate::core::privacy::gate::{PrivacyConfig, PrivacyDirectives};
use crate::core::privacy::scrub;
use anyhow::{anyhow, bail};
use tracing::{debug, info};

/// Derives the request's privacy directives, applies the COPPA scrub,
/// and refuses geo-blocked traffic outright
pub struct PrivacyGateTask {
    config: PrivacyConfig,
}

impl PrivacyGateTask {
    pub fn new(config: PrivacyConfig) -> Self {
        Self { config }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for PrivacyGateTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let span = child_span_info!(
            "privacy_gate_task",
            gdpr = tracing::field::Empty,
            ccpa = tracing::field::Empty,
            coppa = tracing::field::Empty
        )
        .entered();

        let directives = {
            let req = context.req.read();
            PrivacyDirectives::derive(&req, &self.config)
        };

        span.record("gdpr", directives.gdpr_applies);
        span.record("ccpa", directives.ccpa_applies);
        span.record("coppa", directives.coppa);

        if directives.blocked {
            info!("Privacy geo enforcement refused request");

            context
                .privacy_blocked
                .set(())
                .map_err(|_| anyhow!("Privacy block already set"))?;

            context
                .res
                .set(BidResponseState::NoBid {
                    desc: Some("Privacy blocked"),
                })
                .expect("Shouldnt have brs");

            bail!("Request refused by privacy geo enforcement");
        }

        if directives.coppa {
            let mut req = context.req.write();
            scrub::scrub_request(&mut req);
        }

        debug!(
            "Privacy directives: gdpr={} ccpa={} coppa={}",
            directives.gdpr_applies, directives.ccpa_applies, directives.coppa
        );

        context
            .privacy
            .set(directives)
            .map_err(|_| anyhow!("Privacy directives already set"))?;

        Ok(())
    }
}
