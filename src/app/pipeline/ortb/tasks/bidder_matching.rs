use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::context::{BidderCallout, BidderContext, ExcludeReason};
use crate::child_span_info;
use crate::core::adapters::registry::{AdapterRegistry, RegisteredBidder};
use crate::core::breaker::BreakerBoard;
use crate::core::ortb::{BidRequest, BidResponseState};
use crate::core::pipeline::AsyncTask;
use crate::core::spec::nobidreasons;
use anyhow::{Error, bail};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{Instrument, Span, debug};

/// Selects which bidders participate and builds their callouts.
///
/// Exclusion rules run in order per bidder: disabled, media
/// capability, consent, circuit breaker, outbound QPS, and finally
/// the per-auction bidder cap. Excluded bidders are recorded with
/// their reason and receive no outbound call.
pub struct BidderMatchingTask {
    registry: Arc<AdapterRegistry>,
    breakers: Arc<BreakerBoard>,
    qps: HashMap<String, DefaultDirectRateLimiter>,
    max_bidders: usize,
}

fn build_qps_limiters(registry: &AdapterRegistry) -> HashMap<String, DefaultDirectRateLimiter> {
    let mut limiters = HashMap::new();

    for entry in registry.list() {
        if let Some(qps) = NonZeroU32::new(entry.bidder.qps) {
            debug!("Bidder {} outbound QPS limit {}", entry.bidder.code, qps);
            limiters.insert(
                entry.bidder.code.clone(),
                RateLimiter::direct(Quota::per_second(qps)),
            );
        }
    }

    limiters
}

fn media_matches(req: &BidRequest, entry: &RegisteredBidder) -> bool {
    let is_app = req.app.is_some();
    let supported = entry.bidder.media_for_channel(is_app);

    if supported.is_empty() {
        return false;
    }

    req.imp
        .iter()
        .flat_map(|imp| imp.media_types())
        .any(|media| supported.contains(&media))
}

impl BidderMatchingTask {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        breakers: Arc<BreakerBoard>,
        max_bidders: usize,
    ) -> Self {
        let qps = build_qps_limiters(&registry);

        Self {
            registry,
            breakers,
            qps,
            max_bidders,
        }
    }

    fn exclusion_for(
        &self,
        context: &AuctionContext,
        req: &BidRequest,
        entry: &RegisteredBidder,
        selected_so_far: usize,
    ) -> Option<ExcludeReason> {
        if !entry.bidder.info.enabled {
            return Some(ExcludeReason::Disabled);
        }

        if !media_matches(req, entry) {
            return Some(ExcludeReason::NoMatchingMedia);
        }

        let privacy = context.privacy.get();
        if let Some(privacy) = privacy {
            if !privacy.bidder_allowed(&entry.bidder.info) {
                return Some(ExcludeReason::ConsentDenied);
            }
        }

        if !self.breakers.allow(&entry.bidder.code) {
            return Some(ExcludeReason::CircuitOpen);
        }

        if let Some(limiter) = self.qps.get(&entry.bidder.code) {
            if limiter.check().is_err() {
                return Some(ExcludeReason::RateLimited);
            }
        }

        if selected_so_far >= self.max_bidders {
            return Some(ExcludeReason::RateLimited);
        }

        None
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = Span::current();

        // deterministic iteration - the registry map order is not
        let mut entries: Vec<&RegisteredBidder> = self.registry.list().collect();
        entries.sort_by(|a, b| a.bidder.code.cmp(&b.bidder.code));

        let req_snapshot = context.req.read().clone();
        let sync_uids = context.sync_uids.get();

        let mut bidder_contexts = Vec::new();
        let mut consent_denials = 0usize;

        for entry in entries {
            let code = entry.bidder.code.as_str();

            if let Some(reason) =
                self.exclusion_for(context, &req_snapshot, entry, bidder_contexts.len())
            {
                debug!("Excluding bidder {}: {}", code, reason);

                if reason == ExcludeReason::ConsentDenied {
                    consent_denials += 1;
                }

                context.exclude(code, reason);
                continue;
            }

            // each bidder builds from its own deep copy, with its own
            // synced buyeruid stamped in
            let mut bidder_req = req_snapshot.clone();
            if let Some(entry_uid) = sync_uids.and_then(|uids| uids.get(code)) {
                let user = bidder_req.user.get_or_insert_with(Default::default);
                if user.buyeruid.is_empty() {
                    user.buyeruid = entry_uid.uid.clone();
                }
            }

            let (requests, build_errors) =
                entry.adapter.make_requests(&bidder_req, &entry.bidder);

            bidder_contexts.push(BidderContext {
                bidder: entry.bidder.clone(),
                adapter: entry.adapter.clone(),
                callouts: requests.into_iter().map(BidderCallout::new).collect(),
                build_errors: build_errors.iter().map(|e| e.to_string()).collect(),
            });
        }

        if !span.is_disabled() {
            span.record("bidder_matches_count", bidder_contexts.len());
            span.record(
                "callouts_count",
                bidder_contexts
                    .iter()
                    .map(|b| b.callouts.len())
                    .sum::<usize>(),
            );
        }

        if bidder_contexts.is_empty() {
            let excluded = context.excluded.lock().len();

            let (nbr, msg): (u32, &'static str) = if consent_denials > 0 && consent_denials == excluded
            {
                (nobidreasons::CONSENT_DENIED_ALL, "Consent denied all buyers")
            } else {
                (nobidreasons::NO_BUYERS_PREMATCHED, "No matching bidders")
            };

            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr,
                    desc: Some(msg),
                })
                .expect("Shouldnt have brs");

            bail!(msg);
        }

        debug!("Matched {} bidders", bidder_contexts.len());

        *context.bidders.lock().await = bidder_contexts;

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for BidderMatchingTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!(
            "bidder_matching_task",
            bidder_matches_count = tracing::field::Empty,
            callouts_count = tracing::field::Empty
        );

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapters::{BidderAdapter, StandardAdapter};
    use crate::core::breaker::BreakerPolicy;
    use crate::core::models::bidder::{Bidder, BidderInfo};
    use crate::core::ortb::{Banner, BidRequestBuilder, ImpBuilder, MediaType, Regs, Site};
    use crate::core::privacy::{PrivacyConfig, PrivacyDirectives};

    fn banner_bidder(code: &str) -> Bidder {
        Bidder {
            code: code.to_string(),
            endpoint: format!("https://{}.example/rtb", code),
            gzip: false,
            info: BidderInfo {
                enabled: true,
                gvl_id: Some(10),
                site_media: vec![MediaType::Banner],
                app_media: vec![MediaType::Banner],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn registry(bidders: Vec<Bidder>) -> Arc<AdapterRegistry> {
        let adapter: Arc<dyn BidderAdapter> = Arc::new(StandardAdapter);
        Arc::new(AdapterRegistry::build(
            bidders.into_iter().map(|b| (b, adapter.clone())).collect(),
        ))
    }

    fn banner_request() -> BidRequest {
        BidRequestBuilder::default()
            .id("r1".to_string())
            .imp(vec![
                ImpBuilder::default()
                    .id("1".to_string())
                    .banner(Some(Banner::default()))
                    .build()
                    .unwrap(),
            ])
            .site(Some(Site {
                domain: "pub.example".to_string(),
                ..Default::default()
            }))
            .build()
            .unwrap()
    }

    fn context(req: BidRequest) -> AuctionContext {
        let ctx = AuctionContext::new("test".to_string(), "pub-1".to_string(), req);
        ctx.privacy
            .set(PrivacyDirectives::derive(
                &ctx.req.read().clone(),
                &PrivacyConfig::default(),
            ))
            .ok();
        ctx
    }

    fn breakers() -> Arc<BreakerBoard> {
        Arc::new(BreakerBoard::new(BreakerPolicy::default()))
    }

    #[tokio::test]
    async fn selects_capable_bidders_and_builds_callouts() {
        let registry = registry(vec![banner_bidder("dsp-a"), banner_bidder("dsp-b")]);
        let task = BidderMatchingTask::new(registry, breakers(), 15);

        let ctx = context(banner_request());
        task.run0(&ctx).await.unwrap();

        let bidders = ctx.bidders.lock().await;
        assert_eq!(bidders.len(), 2);
        assert_eq!(bidders[0].callouts.len(), 1);
    }

    #[tokio::test]
    async fn open_breaker_excludes_without_callout() {
        let registry = registry(vec![banner_bidder("dsp-a"), banner_bidder("dsp-b")]);
        let board = breakers();
        board.trip("dsp-a");

        let task = BidderMatchingTask::new(registry, board, 15);
        let ctx = context(banner_request());
        task.run0(&ctx).await.unwrap();

        let bidders = ctx.bidders.lock().await;
        assert_eq!(bidders.len(), 1);
        assert_eq!(bidders[0].bidder.code, "dsp-b");

        let excluded = ctx.excluded.lock();
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].code, "dsp-a");
        assert_eq!(excluded[0].reason, ExcludeReason::CircuitOpen);
    }

    #[tokio::test]
    async fn gdpr_without_consent_excludes_everyone_with_reason() {
        let registry = registry(vec![banner_bidder("dsp-a"), banner_bidder("dsp-b")]);
        let task = BidderMatchingTask::new(registry, breakers(), 15);

        let mut req = banner_request();
        req.regs = Some(Regs {
            gdpr: Some(1),
            ..Default::default()
        });

        let ctx = context(req);
        let result = task.run0(&ctx).await;

        assert!(result.is_err());
        assert!(ctx.bidders.lock().await.is_empty(), "no callouts built");

        let excluded = ctx.excluded.lock();
        assert_eq!(excluded.len(), 2);
        assert!(
            excluded
                .iter()
                .all(|e| e.reason == ExcludeReason::ConsentDenied)
        );

        match ctx.res.get() {
            Some(BidResponseState::NoBidReason { nbr, .. }) => {
                assert_eq!(*nbr, nobidreasons::CONSENT_DENIED_ALL);
            }
            other => panic!("expected consent nbr, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn media_mismatch_is_excluded() {
        let mut video_only = banner_bidder("video-dsp");
        video_only.info.site_media = vec![MediaType::Video];
        video_only.info.app_media = vec![MediaType::Video];

        let registry = registry(vec![video_only, banner_bidder("dsp-b")]);
        let task = BidderMatchingTask::new(registry, breakers(), 15);

        let ctx = context(banner_request());
        task.run0(&ctx).await.unwrap();

        assert_eq!(ctx.bidders.lock().await.len(), 1);
        assert_eq!(
            ctx.excluded.lock()[0].reason,
            ExcludeReason::NoMatchingMedia
        );
    }

    #[tokio::test]
    async fn bidder_cap_limits_selection() {
        let registry = registry(vec![
            banner_bidder("dsp-a"),
            banner_bidder("dsp-b"),
            banner_bidder("dsp-c"),
        ]);
        let task = BidderMatchingTask::new(registry, breakers(), 2);

        let ctx = context(banner_request());
        task.run0(&ctx).await.unwrap();

        assert_eq!(ctx.bidders.lock().await.len(), 2);
        assert_eq!(ctx.excluded.lock().len(), 1);
    }

    #[tokio::test]
    async fn synced_buyeruid_lands_in_the_callout_payload() {
        let registry = registry(vec![banner_bidder("dsp-a")]);
        let task = BidderMatchingTask::new(registry, breakers(), 15);

        let ctx = context(banner_request());
        ctx.sync_uids
            .set(
                [(
                    "dsp-a".to_string(),
                    crate::core::usersync::SyncEntry::new("buyer-99".to_string(), u64::MAX),
                )]
                .into(),
            )
            .ok();

        task.run0(&ctx).await.unwrap();

        let bidders = ctx.bidders.lock().await;
        let payload = &bidders[0].callouts[0].http.payload;
        assert_eq!(payload.user.as_ref().unwrap().buyeruid, "buyer-99");

        // the shared request never saw the uid
        assert!(ctx.req.read().user.is_none());
    }
}
