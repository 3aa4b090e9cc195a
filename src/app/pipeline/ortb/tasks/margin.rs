use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::context::BidderResponseState;
use crate::child_span_info;
use crate::core::economics;
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use tracing::{Instrument, debug, warn};

/// Settles every surviving bid against the multiplier: the adjusted
/// (publisher-attributed) price and the platform cut. Settlement is
/// price math only - winner choice happens downstream over the
/// adjusted values.
pub struct BidMarginTask {
    multiplier: f64,
}

impl BidMarginTask {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let mut bidders = context.bidders.lock().await;

        for bidder_ctx in bidders.iter_mut() {
            for callout in bidder_ctx.callouts.iter_mut() {
                let response = match callout.response.get_mut() {
                    Some(response) => response,
                    None => continue,
                };

                let bids_ctx = match &mut response.state {
                    BidderResponseState::Bid(bids_ctx) => bids_ctx,
                    _ => continue,
                };

                for bid_ctx in bids_ctx.bids.iter_mut() {
                    if bid_ctx.filter_reason.is_some() {
                        continue;
                    }

                    if bid_ctx.settled.is_some() {
                        warn!("Bid {} already settled, skipping", bid_ctx.bid.id);
                        continue;
                    }

                    if bid_ctx.bid.price != bid_ctx.original_price {
                        warn!("Bid price drifted from recorded original, resetting");
                        bid_ctx.bid.price = bid_ctx.original_price;
                    }

                    let settled = economics::settle_bid(bid_ctx.original_price, self.multiplier);

                    debug!(
                        "Settled bid {}: gross ${} -> adjusted ${} (cut ${})",
                        bid_ctx.bid.id, settled.gross, settled.adjusted, settled.platform_cut
                    );

                    bid_ctx.settled = Some(settled);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for BidMarginTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("bid_margin_task");

        self.run0(context).instrument(span).await
    }
}
