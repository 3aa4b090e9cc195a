use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::context::BidderResponseState;
use crate::child_span_info;
use crate::core::events::model::{AuctionRecord, BidderOutcomeRecord, EventRecord, WinnerRecord};
use crate::core::events::recorder::EventRecorder;
use crate::core::metrics;
use crate::core::ortb::BidResponseState;
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

/// Finalizer: assembles the immutable analytics view of the auction
/// and hands it to the recorder. Runs even when the auction pipeline
/// bailed early, so every request leaves a record.
pub struct RecordAuctionTask {
    recorder: Arc<EventRecorder>,
}

impl RecordAuctionTask {
    pub fn new(recorder: Arc<EventRecorder>) -> Self {
        Self { recorder }
    }

    /// Collapses a bidder's callouts into one status: any bid beats
    /// timeout beats error beats no-bid
    fn bidder_outcome(
        code: &str,
        callouts: &[crate::app::pipeline::ortb::context::BidderCallout],
        build_errors: &[String],
    ) -> BidderOutcomeRecord {
        let mut status = "no_bid";
        let mut latency_ms = 0u64;
        let mut bids = 0usize;
        let mut errors: Vec<String> = build_errors.to_vec();

        let rank = |s: &str| match s {
            "bid" => 3,
            "timeout" => 2,
            "error" => 1,
            _ => 0,
        };

        for callout in callouts {
            let response = match callout.response.get() {
                Some(response) => response,
                None => continue,
            };

            latency_ms = latency_ms.max(response.latency.as_millis() as u64);

            match &response.state {
                BidderResponseState::Bid(bids_ctx) => {
                    bids += bids_ctx.bids.len();
                    errors.extend(bids_ctx.errors.iter().cloned());
                }
                BidderResponseState::Error(e) => errors.push(e.clone()),
                _ => {}
            }

            let label = response.state.status_label();
            if rank(label) > rank(status) {
                status = label;
            }
        }

        BidderOutcomeRecord {
            bidder: code.to_string(),
            status: status.to_string(),
            latency_ms,
            bids,
            errors,
        }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let bidders = context.bidders.lock().await;

        let bidder_outcomes: Vec<BidderOutcomeRecord> = bidders
            .iter()
            .map(|b| Self::bidder_outcome(&b.bidder.code, &b.callouts, &b.build_errors))
            .collect();

        let selected: Vec<String> = bidders.iter().map(|b| b.bidder.code.clone()).collect();
        drop(bidders);

        let excluded: Vec<(String, String)> = context
            .excluded
            .lock()
            .iter()
            .map(|e| (e.code.clone(), e.reason.to_string()))
            .collect();

        let winners: Vec<WinnerRecord> = context
            .winners
            .lock()
            .iter()
            .map(|w| WinnerRecord {
                impid: w.impid.clone(),
                bidder: w.bidder.clone(),
                bid_id: w.bid.id.clone(),
                media: w.media.to_string(),
                gross_price: w.settled.gross,
                clearing_price: w.settled.adjusted,
                platform_cut: w.settled.platform_cut,
            })
            .collect();

        let revenue = winners.iter().map(|w| w.platform_cut).sum();

        let outcome = match context.res.get() {
            Some(BidResponseState::Bid(_)) => "success",
            Some(_) => "no_bids",
            None => "error",
        };

        let (channel, tmax_ms) = {
            let req = context.req.read();
            let channel = if req.app.is_some() { "app" } else { "site" };
            (channel.to_string(), req.tmax)
        };

        let privacy = context.privacy.get();

        let record = AuctionRecord {
            auction_id: context.auction_id.clone(),
            pubid: context.pubid.clone(),
            received_at: context.received_wall,
            tmax_ms: context.tmax_ms.get().copied().unwrap_or(tmax_ms),
            channel,
            selected,
            excluded,
            bidders: bidder_outcomes,
            winners,
            revenue,
            gdpr: privacy.map(|p| p.gdpr_applies).unwrap_or(false),
            ccpa: privacy.map(|p| p.ccpa_applies).unwrap_or(false),
            coppa: privacy.map(|p| p.coppa).unwrap_or(false),
            validation_errors: context.validation_errors.lock().clone(),
            outcome: outcome.to_string(),
        };

        metrics::REQUESTS_TOTAL
            .with_label_values(&[&record.pubid, outcome])
            .inc();

        self.recorder.record(EventRecord::Auction(record));

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for RecordAuctionTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("record_auction_task");

        self.run0(context).instrument(span).await
    }
}
