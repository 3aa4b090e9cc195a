use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::context::BidderResponseState;
use crate::child_span_info;
use crate::core::metrics;
use crate::core::pipeline::AsyncTask;
use crate::core::validation::{self, BidRejection};
use anyhow::Error;
use async_trait::async_trait;
use tracing::{Instrument, debug};

/// Runs the structural validator and the floor check over every bid
/// that came back. Failing bids get a filter reason and are recorded;
/// the auction itself never fails here.
///
/// The floor compared against is the one the bidder saw, which
/// already carries the multiplier markup from the floors stage.
pub struct BidValidationTask;

impl BidValidationTask {
    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let req = context.req.read().clone();
        let mut bidders = context.bidders.lock().await;

        for bidder_ctx in bidders.iter_mut() {
            let code = bidder_ctx.bidder.code.clone();

            for callout in bidder_ctx.callouts.iter_mut() {
                let response = match callout.response.get_mut() {
                    Some(response) => response,
                    None => continue,
                };

                let bids_ctx = match &mut response.state {
                    BidderResponseState::Bid(bids_ctx) => bids_ctx,
                    _ => continue,
                };

                let currency = bids_ctx.currency.clone();

                for bid_ctx in bids_ctx.bids.iter_mut() {
                    let rejection =
                        match validation::validate_bid(&req, &bid_ctx.bid, &currency) {
                            Ok(media) => {
                                bid_ctx.media = Some(media);

                                let floor = req
                                    .imp_by_id(&bid_ctx.bid.impid)
                                    .map(|imp| imp.bidfloor)
                                    .unwrap_or(0.0);

                                if bid_ctx.bid.price < floor {
                                    Some(BidRejection::BelowFloor)
                                } else {
                                    None
                                }
                            }
                            Err(rejection) => Some(rejection),
                        };

                    if let Some(rejection) = rejection {
                        debug!(
                            "Dropping bid {} from {}: {}",
                            bid_ctx.bid.id, code, rejection
                        );

                        metrics::BIDS_DROPPED
                            .with_label_values(&[code.as_str(), &rejection.to_string()])
                            .inc();

                        context.record_validation_error(format!(
                            "{}: bid {} {}",
                            code, bid_ctx.bid.id, rejection
                        ));

                        bid_ctx.filter_reason = Some(rejection.to_string());
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for BidValidationTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("bid_validation_task");

        self.run0(context).instrument(span).await
    }
}
