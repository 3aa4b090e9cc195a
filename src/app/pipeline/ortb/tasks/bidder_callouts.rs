use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::context::{
    BidContext, BidderCallout, BidderContext, BidderResponseState, BidsContext, CalloutResponse,
    ExcludeReason,
};
use crate::child_span_info;
use crate::core::breaker::BreakerBoard;
use crate::core::demand::client::{CalloutError, Dispatch, callout_budget};
use crate::core::metrics;
use crate::core::ortb::BidResponseState;
use crate::core::pipeline::AsyncTask;
use crate::core::spec::nobidreason;
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span, debug, trace};

/// The concurrent fan-out over every built callout and the
/// deadline-bounded fan-in of their results.
///
/// # Behavior
/// * One worker future per callout, each handed the remaining budget
/// (deadline minus safety margin) as its hard timeout
/// * Results land in each callout's OnceLock response slot - no
/// worker ever sees another worker's state
/// * When the deadline fires, outstanding workers are dropped, which
/// cancels their in-flight network I/O; their slots are then recorded
/// as timeouts. A late completion racing the cancel loses the slot
/// write and is discarded whole.
pub struct BidderCalloutsTask {
    dispatch: Arc<dyn Dispatch>,
    breakers: Arc<BreakerBoard>,
    safety_margin: Duration,
}

impl BidderCalloutsTask {
    pub fn new(
        dispatch: Arc<dyn Dispatch>,
        breakers: Arc<BreakerBoard>,
        safety_margin: Duration,
    ) -> Self {
        Self {
            dispatch,
            breakers,
            safety_margin,
        }
    }

    /// Executes one callout to completion and fills its slot
    async fn call_one(&self, bidder_ctx: &BidderContext, callout: &BidderCallout, budget: Duration) {
        let code = bidder_ctx.bidder.code.as_str();

        let result = self.dispatch.send(&callout.http, budget).await;
        let latency = result.latency;
        let status = result.status;

        let state = match &result.error {
            Some(CalloutError::Timeout) => {
                self.breakers.record_failure(code);
                BidderResponseState::Timeout
            }
            Some(error) => {
                self.breakers.record_failure(code);
                BidderResponseState::Error(error.to_string())
            }
            None if result.is_no_bid() => {
                self.breakers.record_success(code);
                BidderResponseState::NoBid
            }
            None => {
                let (parsed, errors) = bidder_ctx
                    .adapter
                    .make_bids(&callout.http.payload, &result.body);

                match parsed {
                    Some(adapter_bids) => {
                        self.breakers.record_success(code);

                        let bids = adapter_bids
                            .bids
                            .into_iter()
                            .map(|typed| BidContext {
                                original_price: typed.bid.price,
                                bid: typed.bid,
                                media: typed.media,
                                settled: None,
                                filter_reason: None,
                            })
                            .collect();

                        BidderResponseState::Bid(BidsContext {
                            response_id: adapter_bids.response_id,
                            currency: adapter_bids.currency,
                            bids,
                            errors: errors.iter().map(|e| e.to_string()).collect(),
                        })
                    }
                    None => {
                        self.breakers.record_failure(code);

                        let joined = errors
                            .iter()
                            .map(|e| e.to_string())
                            .collect::<Vec<_>>()
                            .join("; ");

                        BidderResponseState::Error(joined)
                    }
                }
            }
        };

        metrics::BIDDER_CALLOUTS
            .with_label_values(&[code, state.status_label()])
            .inc();
        metrics::BIDDER_LATENCY
            .with_label_values(&[code])
            .observe(latency.as_secs_f64());

        trace!("Callout to {} finished: {}", code, state.status_label());

        // a duplicate or post-cancel write loses quietly
        let _ = callout.response.set(CalloutResponse {
            state,
            latency,
            status,
        });
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = Span::current();

        let deadline = *context
            .deadline
            .get()
            .ok_or_else(|| anyhow!("No deadline on context at fan-out"))?;

        let bidders = context.bidders.lock().await;

        let budget = match callout_budget(deadline, self.safety_margin) {
            Ok(budget) => budget,
            Err(_) => {
                // upstream stages ate the whole budget
                for bidder_ctx in bidders.iter() {
                    context.exclude(
                        &bidder_ctx.bidder.code,
                        ExcludeReason::TimeoutExceededBudget,
                    );
                }

                context
                    .res
                    .set(BidResponseState::NoBidReason {
                        reqid: context.original_auction_id.clone(),
                        nbr: nobidreason::INSUFFICIENT_AUCTION_TIME,
                        desc: Some("Budget exhausted before fan-out"),
                    })
                    .expect("Shouldnt have brs");

                bail!("No callout budget remained at fan-out");
            }
        };

        let mut workers = FuturesUnordered::new();

        for bidder_ctx in bidders.iter() {
            for callout in &bidder_ctx.callouts {
                workers.push(self.call_one(bidder_ctx, callout, budget));
            }
        }

        let total = workers.len();
        debug!("Fanning out {} callouts with {:?} budget", total, budget);

        let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
        tokio::pin!(sleep);

        let mut finished = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = &mut sleep => {
                    debug!("Deadline elapsed with {}/{} callouts done", finished, total);
                    break;
                }
                next = workers.next() => match next {
                    Some(()) => finished += 1,
                    None => break,
                }
            }
        }

        // cancellation propagates to in-flight I/O here
        drop(workers);

        for bidder_ctx in bidders.iter() {
            for callout in &bidder_ctx.callouts {
                if callout.response.get().is_some() {
                    continue;
                }

                self.breakers.record_failure(&bidder_ctx.bidder.code);
                metrics::BIDDER_CALLOUTS
                    .with_label_values(&[bidder_ctx.bidder.code.as_str(), "timeout"])
                    .inc();

                let _ = callout.response.set(CalloutResponse {
                    state: BidderResponseState::Timeout,
                    latency: budget,
                    status: 0,
                });
            }
        }

        if !span.is_disabled() {
            span.record("callouts_total", total);
            span.record("callouts_finished", finished);
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for BidderCalloutsTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!(
            "bidder_callouts_task",
            callouts_total = tracing::field::Empty,
            callouts_finished = tracing::field::Empty
        );

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapters::adapter::BidderHttpRequest;
    use crate::core::breaker::{BreakerPolicy, BreakerState};
    use crate::core::demand::client::CalloutResult;
    use crate::test_support::fake_dispatch::{FakeDispatch, Script};
    use crate::test_support::fixtures;
    use std::time::Instant;

    fn task(dispatch: Arc<FakeDispatch>) -> (BidderCalloutsTask, Arc<BreakerBoard>) {
        let breakers = Arc::new(BreakerBoard::new(BreakerPolicy {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }));

        (
            BidderCalloutsTask::new(dispatch, breakers.clone(), Duration::from_millis(50)),
            breakers,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn fast_bidders_land_before_the_deadline() {
        let dispatch = FakeDispatch::new();
        dispatch.script("dsp-a", Script::bid(1.5, Duration::from_millis(100)));
        dispatch.script("dsp-b", Script::bid(1.2, Duration::from_millis(200)));

        let (task, _) = task(dispatch.clone());

        let ctx = fixtures::matched_context(vec!["dsp-a", "dsp-b"], 1000).await;
        task.run0(&ctx).await.unwrap();

        let bidders = ctx.bidders.lock().await;
        for bidder_ctx in bidders.iter() {
            let response = bidder_ctx.callouts[0].response.get().unwrap();
            assert!(matches!(response.state, BidderResponseState::Bid(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_bidder_records_timeout_and_fast_one_survives() {
        let dispatch = FakeDispatch::new();
        dispatch.script("dsp-a", Script::bid(1.5, Duration::from_millis(100)));
        dispatch.script("dsp-b", Script::bid(1.2, Duration::from_millis(2000)));

        let (task, _) = task(dispatch.clone());

        let started = Instant::now();
        let ctx = fixtures::matched_context(vec!["dsp-a", "dsp-b"], 1000).await;
        task.run0(&ctx).await.unwrap();

        // paused clock: elapsed is virtual, bounded by tmax + margin
        assert!(started.elapsed() < Duration::from_millis(1200));

        let bidders = ctx.bidders.lock().await;

        let by_code = |code: &str| {
            bidders
                .iter()
                .find(|b| b.bidder.code == code)
                .unwrap()
                .callouts[0]
                .response
                .get()
                .unwrap()
                .clone()
        };

        assert!(matches!(by_code("dsp-a").state, BidderResponseState::Bid(_)));
        assert!(matches!(
            by_code("dsp-b").state,
            BidderResponseState::Timeout
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn errors_count_against_the_breaker() {
        let dispatch = FakeDispatch::new();
        dispatch.script(
            "dsp-a",
            Script::Fixed(CalloutResult {
                status: 503,
                body: bytes::Bytes::new(),
                latency: Duration::from_millis(5),
                bytes_out: 0,
                error: Some(CalloutError::Status(503)),
            }),
        );

        let (task, breakers) = task(dispatch.clone());

        for _ in 0..3 {
            let ctx = fixtures::matched_context(vec!["dsp-a"], 500).await;
            task.run0(&ctx).await.unwrap();
        }

        assert_eq!(breakers.state("dsp-a"), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn no_bid_204_counts_as_breaker_success() {
        let dispatch = FakeDispatch::new();
        dispatch.script("dsp-a", Script::no_bid(Duration::from_millis(10)));

        let (task, breakers) = task(dispatch.clone());

        let ctx = fixtures::matched_context(vec!["dsp-a"], 500).await;
        task.run0(&ctx).await.unwrap();

        assert_eq!(breakers.state("dsp-a"), BreakerState::Closed);

        let bidders = ctx.bidders.lock().await;
        assert!(matches!(
            bidders[0].callouts[0].response.get().unwrap().state,
            BidderResponseState::NoBid
        ));
    }

    #[tokio::test]
    async fn exhausted_budget_short_circuits_all_bidders() {
        let dispatch = FakeDispatch::new();
        let (task, _) = task(dispatch.clone());

        // deadline already in the past when fan-out starts
        let ctx = fixtures::matched_context_with_deadline(
            vec!["dsp-a", "dsp-b"],
            Instant::now() - Duration::from_millis(10),
        )
        .await;

        assert!(task.run0(&ctx).await.is_err());
        assert!(dispatch.calls().is_empty(), "nothing went on the wire");

        let excluded = ctx.excluded.lock();
        assert_eq!(excluded.len(), 2);
        assert!(
            excluded
                .iter()
                .all(|e| e.reason == ExcludeReason::TimeoutExceededBudget)
        );
    }

    /// An adapter mutating its payload copy cannot be observed by any
    /// other bidder's payload or the original request
    #[tokio::test(start_paused = true)]
    async fn payload_copies_are_isolated(){
        let ctx = fixtures::matched_context(vec!["dsp-a", "dsp-b"], 1000).await;

        {
            let mut bidders = ctx.bidders.lock().await;
            bidders[0].callouts[0].http.payload.imp[0].bidfloor = 42.0;
            bidders[0].callouts[0].http.payload.imp[0].tagid = "mutated".to_string();
        }

        let bidders = ctx.bidders.lock().await;
        assert_eq!(bidders[1].callouts[0].http.payload.imp[0].bidfloor, 1.0);
        assert!(bidders[1].callouts[0].http.payload.imp[0].tagid.is_empty());
        assert_eq!(ctx.req.read().imp[0].bidfloor, 1.0);
    }
}
