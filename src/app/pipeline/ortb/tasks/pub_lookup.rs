use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::managers::PublisherManager;
use crate::core::ortb::BidResponseState;
use crate::core::pipeline::BlockingTask;
use crate::core::spec::nobidreasons;
use anyhow::{anyhow, bail};
use std::sync::Arc;
use tracing::debug;

pub struct PubLookupTask {
    publishers: Arc<PublisherManager>,
}

impl PubLookupTask {
    pub fn new(publishers: Arc<PublisherManager>) -> Self {
        Self { publishers }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for PubLookupTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let _span = child_span_info!("pub_lookup_task").entered();

        let publisher = match self.publishers.get(&context.pubid) {
            Some(publisher) => publisher,
            None => {
                context
                    .res
                    .set(BidResponseState::NoBidReason {
                        reqid: context.original_auction_id.clone(),
                        nbr: nobidreasons::UNKNOWN_SELLER,
                        desc: Some("Unknown publisher id"),
                    })
                    .expect("Shouldnt have brs");

                bail!("Unknown publisher {}", context.pubid);
            }
        };

        if !publisher.enabled {
            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr: nobidreasons::SELLER_DISABLED,
                    desc: Some("Publisher disabled"),
                })
                .expect("Shouldnt have brs");

            bail!("Publisher {} is disabled", context.pubid);
        }

        debug!("Resolved publisher {}", publisher.id);

        context
            .publisher
            .set(publisher)
            .map_err(|_| anyhow!("Publisher already set on context"))?;

        Ok(())
    }
}
