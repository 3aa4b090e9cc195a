use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::enrichment::DeviceLookup;
use crate::core::filters::{IvtFilter, IvtVerdict};
use crate::core::ortb::BidResponseState;
use crate::core::pipeline::BlockingTask;
use crate::core::spec::nobidreasons;
use anyhow::bail;
use std::sync::Arc;
use tracing::{debug, info};

pub struct IvtFilterTask {
    filter: IvtFilter,
    device_lookup: Arc<DeviceLookup>,
}

impl IvtFilterTask {
    pub fn new(filter: IvtFilter, device_lookup: Arc<DeviceLookup>) -> Self {
        Self {
            filter,
            device_lookup,
        }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for IvtFilterTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let span = child_span_info!("ivt_filter_task", verdict = tracing::field::Empty).entered();

        if !self.filter.enabled() {
            return Ok(());
        }

        let verdict = {
            let req = context.req.read();
            self.filter.inspect(&req, &self.device_lookup)
        };

        span.record("verdict", verdict.to_string());

        if verdict == IvtVerdict::Clean {
            debug!("IVT checks passed");
            return Ok(());
        }

        if !self.filter.blocking() {
            info!("IVT monitoring flagged request: {}", verdict);
            return Ok(());
        }

        context
            .res
            .set(BidResponseState::NoBidReason {
                reqid: context.original_auction_id.clone(),
                nbr: nobidreasons::INVALID_TRAFFIC,
                desc: Some("Invalid traffic"),
            })
            .expect("Shouldnt have brs");

        bail!("IVT blocked request: {}", verdict);
    }
}
