use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::ortb::BidResponseState;
use crate::core::pipeline::BlockingTask;
use crate::core::spec::{nobidreason, nobidreasons};
use anyhow::anyhow;
use tracing::debug;

pub struct ValidateRequestTask;

fn no_bid(context: &AuctionContext, nbr: u32, desc: &'static str) {
    let brs = BidResponseState::NoBidReason {
        reqid: context.original_auction_id.clone(),
        nbr,
        desc: Some(desc),
    };

    context
        .res
        .set(brs)
        .expect("Should not have response state assigned already");
}

impl BlockingTask<AuctionContext, anyhow::Error> for ValidateRequestTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let span = child_span_info!(
            "request_validate_task",
            invalid_reason = tracing::field::Empty
        )
        .entered();

        let req = context.req.read();

        if req.id.is_empty() {
            no_bid(context, nobidreason::INVALID_REQUEST, "Missing req id");
            span.record("invalid_reason", "missing_auction_id");
            return Err(anyhow!("Auction missing id value"));
        }

        if req.imp.is_empty() {
            no_bid(context, nobidreason::INVALID_REQUEST, "Empty imps");
            span.record("invalid_reason", "missing_imps");
            return Err(anyhow!("Auction missing imps"));
        }

        for imp in &req.imp {
            if imp.id.is_empty() {
                no_bid(context, nobidreason::INVALID_REQUEST, "Imp missing id");
                span.record("invalid_reason", "imp_missing_id");
                return Err(anyhow!("Imp without id"));
            }

            if imp.media_types().is_empty() {
                no_bid(context, nobidreason::INVALID_REQUEST, "Imp missing media");
                span.record("invalid_reason", "imp_missing_media");
                return Err(anyhow!("Imp {} carries no media object", imp.id));
            }
        }

        // exactly one inventory context, never both, never neither
        match (&req.site, &req.app) {
            (Some(_), Some(_)) => {
                no_bid(
                    context,
                    nobidreason::INVALID_REQUEST,
                    "Both site and app present",
                );
                span.record("invalid_reason", "site_and_app");
                return Err(anyhow!("Auction carries both site and app"));
            }
            (None, None) => {
                no_bid(
                    context,
                    nobidreason::INVALID_REQUEST,
                    "Missing site or app object",
                );
                span.record("invalid_reason", "missing_site_app");
                return Err(anyhow!("Auction missing site or app"));
            }
            _ => {}
        }

        if let Some(site) = &req.site {
            if site.domain.is_empty() && site.page.is_empty() {
                no_bid(
                    context,
                    nobidreasons::MISSING_DOMAIN_OR_BUNDLE,
                    "Missing site domain",
                );
                span.record("invalid_reason", "missing_site_domain");
                return Err(anyhow!("Auction missing site domain"));
            }
        }

        if let Some(app) = &req.app {
            if app.bundle.is_empty() {
                no_bid(
                    context,
                    nobidreasons::MISSING_DOMAIN_OR_BUNDLE,
                    "Missing app bundle",
                );
                span.record("invalid_reason", "missing_app_bundle");
                return Err(anyhow!("Auction missing app bundle"));
            }
        }

        if req.tmax > 0 && req.tmax < 50 {
            no_bid(
                context,
                nobidreason::INSUFFICIENT_AUCTION_TIME,
                "Tmax too low",
            );
            span.record("invalid_reason", "tmax_too_low");
            return Err(anyhow!("Auction tmax too low (< 50ms)"));
        }

        debug!("Request passed basic validation");
        span.record("invalid_reason", "none");

        Ok(())
    }
}
