use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::context::{BidderResponseState, SettledWinner};
use crate::child_span_info;
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use smallvec::SmallVec;
use std::time::Duration;
use tracing::{Instrument, debug};

/// One candidate as flattened out of the callout tree
struct Candidate {
    bidder: String,
    latency: Duration,
    winner: SettledWinner,
}

/// First-price winner selection, one winner per impression.
///
/// Deterministic given the same bid set: highest adjusted price wins,
/// ties go to the lower adapter latency, then the lexicographically
/// smaller bidder code. The clearing price is the winner's adjusted
/// price - no second-price reduction.
pub struct BidSettlementTask;

impl BidSettlementTask {
    async fn collect_candidates(&self, context: &AuctionContext) -> SmallVec<[Candidate; 16]> {
        let bidders = context.bidders.lock().await;
        let mut candidates = SmallVec::new();

        for bidder_ctx in bidders.iter() {
            for callout in &bidder_ctx.callouts {
                let response = match callout.response.get() {
                    Some(response) => response,
                    None => continue,
                };

                let bids_ctx = match &response.state {
                    BidderResponseState::Bid(bids_ctx) => bids_ctx,
                    _ => continue,
                };

                for bid_ctx in &bids_ctx.bids {
                    if bid_ctx.filter_reason.is_some() {
                        continue;
                    }

                    let (settled, media) = match (bid_ctx.settled, bid_ctx.media) {
                        (Some(settled), Some(media)) => (settled, media),
                        _ => continue,
                    };

                    candidates.push(Candidate {
                        bidder: bidder_ctx.bidder.code.clone(),
                        latency: response.latency,
                        winner: SettledWinner {
                            impid: bid_ctx.bid.impid.clone(),
                            bidder: bidder_ctx.bidder.code.clone(),
                            bid: bid_ctx.bid.clone(),
                            media,
                            settled,
                            latency: response.latency,
                        },
                    });
                }
            }
        }

        candidates
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let mut candidates = self.collect_candidates(context).await;

        // ordering encodes the tie-break: price desc, latency asc,
        // bidder code asc - the first candidate per imp wins
        candidates.sort_by(|a, b| {
            b.winner
                .settled
                .adjusted
                .total_cmp(&a.winner.settled.adjusted)
                .then_with(|| a.latency.cmp(&b.latency))
                .then_with(|| a.bidder.cmp(&b.bidder))
        });

        let imp_ids: Vec<String> = context
            .req
            .read()
            .imp
            .iter()
            .map(|imp| imp.id.clone())
            .collect();

        let mut winners = Vec::with_capacity(imp_ids.len());

        for impid in &imp_ids {
            let winner = candidates
                .iter()
                .find(|c| &c.winner.impid == impid)
                .map(|c| c.winner.clone());

            if let Some(winner) = winner {
                debug!(
                    "Imp {} won by {} at ${} adjusted",
                    impid, winner.bidder, winner.settled.adjusted
                );
                winners.push(winner);
            } else {
                debug!("Imp {} had no valid bids", impid);
            }
        }

        *context.winners.lock() = winners;

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for BidSettlementTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("bid_settlement_task");

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::ortb::context::{
        BidContext, BidderCallout, BidderContext, BidsContext, CalloutResponse,
    };
    use crate::core::adapters::StandardAdapter;
    use crate::core::economics;
    use crate::core::models::bidder::Bidder;
    use crate::core::ortb::{Banner, Bid, BidRequestBuilder, ImpBuilder, MediaType};
    use crate::test_support::fixtures;
    use std::sync::Arc;

    fn bid_context(impid: &str, price: f64) -> BidContext {
        BidContext {
            bid: Bid {
                id: format!("b-{}-{}", impid, price),
                impid: impid.to_string(),
                price,
                adm: "<div/>".to_string(),
                ..Default::default()
            },
            media: Some(MediaType::Banner),
            original_price: price,
            settled: Some(economics::settle_bid(price, 1.0)),
            filter_reason: None,
        }
    }

    fn bidder_with_bids(code: &str, latency_ms: u64, bids: Vec<BidContext>) -> BidderContext {
        let bidder = Bidder {
            code: code.to_string(),
            endpoint: format!("https://{}.example/rtb", code),
            gzip: false,
            ..Default::default()
        };

        let (requests, _) = {
            use crate::core::adapters::BidderAdapter;
            StandardAdapter.make_requests(&fixtures::banner_request(), &bidder)
        };

        let callout = BidderCallout::new(requests.into_iter().next().unwrap());
        callout
            .response
            .set(CalloutResponse {
                state: BidderResponseState::Bid(BidsContext {
                    bids,
                    ..Default::default()
                }),
                latency: Duration::from_millis(latency_ms),
                status: 200,
            })
            .ok();

        BidderContext {
            bidder: Arc::new(bidder),
            adapter: Arc::new(StandardAdapter),
            callouts: vec![callout],
            build_errors: Vec::new(),
        }
    }

    async fn settle(bidders: Vec<BidderContext>) -> Vec<SettledWinner> {
        let ctx = AuctionContext::new(
            "test".to_string(),
            "pub-1".to_string(),
            fixtures::banner_request(),
        );

        *ctx.bidders.lock().await = bidders;

        BidSettlementTask.run0(&ctx).await.unwrap();

        let winners = ctx.winners.lock().clone();
        winners
    }

    #[tokio::test]
    async fn highest_adjusted_price_wins() {
        let winners = settle(vec![
            bidder_with_bids("dsp-a", 100, vec![bid_context("1", 1.5)]),
            bidder_with_bids("dsp-b", 50, vec![bid_context("1", 1.2)]),
        ])
        .await;

        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].bidder, "dsp-a");
        assert_eq!(winners[0].settled.adjusted, 1.5);
    }

    #[tokio::test]
    async fn price_tie_goes_to_lower_latency_then_name() {
        let winners = settle(vec![
            bidder_with_bids("dsp-z", 50, vec![bid_context("1", 1.5)]),
            bidder_with_bids("dsp-a", 100, vec![bid_context("1", 1.5)]),
        ])
        .await;
        assert_eq!(winners[0].bidder, "dsp-z", "faster bidder wins the tie");

        let winners = settle(vec![
            bidder_with_bids("dsp-z", 75, vec![bid_context("1", 1.5)]),
            bidder_with_bids("dsp-a", 75, vec![bid_context("1", 1.5)]),
        ])
        .await;
        assert_eq!(winners[0].bidder, "dsp-a", "name breaks the full tie");
    }

    #[tokio::test]
    async fn filtered_bids_never_win() {
        let mut filtered = bid_context("1", 9.9);
        filtered.filter_reason = Some("below_floor".to_string());

        let winners = settle(vec![
            bidder_with_bids("dsp-a", 100, vec![filtered]),
            bidder_with_bids("dsp-b", 100, vec![bid_context("1", 1.2)]),
        ])
        .await;

        assert_eq!(winners[0].bidder, "dsp-b");
    }

    #[tokio::test]
    async fn multi_imp_requests_settle_independently() {
        let req = BidRequestBuilder::default()
            .id("r1".to_string())
            .imp(vec![
                ImpBuilder::default()
                    .id("1".to_string())
                    .banner(Some(Banner::default()))
                    .build()
                    .unwrap(),
                ImpBuilder::default()
                    .id("2".to_string())
                    .banner(Some(Banner::default()))
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap();

        let ctx = AuctionContext::new("test".to_string(), "pub-1".to_string(), req);

        *ctx.bidders.lock().await = vec![
            bidder_with_bids("dsp-a", 100, vec![bid_context("1", 2.0)]),
            bidder_with_bids("dsp-b", 100, vec![bid_context("1", 1.0), bid_context("2", 3.0)]),
        ];

        BidSettlementTask.run0(&ctx).await.unwrap();

        let winners = ctx.winners.lock();
        assert_eq!(winners.len(), 2);
        assert_eq!(winners[0].bidder, "dsp-a");
        assert_eq!(winners[1].bidder, "dsp-b");
    }
}
