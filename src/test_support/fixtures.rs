use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::context::{BidderCallout, BidderContext};
use crate::core::adapters::{BidderAdapter, StandardAdapter};
use crate::core::models::bidder::{Bidder, BidderInfo};
use crate::core::models::publisher::Publisher;
use crate::core::ortb::{Banner, BidRequest, BidRequestBuilder, ImpBuilder, MediaType, Site};
use crate::core::privacy::{PrivacyConfig, PrivacyDirectives};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One 300x250 banner imp, floor $1.00, site context
pub fn banner_request() -> BidRequest {
    BidRequestBuilder::default()
        .id("req-1".to_string())
        .imp(vec![
            ImpBuilder::default()
                .id("1".to_string())
                .banner(Some(Banner {
                    w: Some(300),
                    h: Some(250),
                    ..Default::default()
                }))
                .bidfloor(1.0)
                .build()
                .unwrap(),
        ])
        .site(Some(Site {
            domain: "pub.example".to_string(),
            page: "https://pub.example/article".to_string(),
            ..Default::default()
        }))
        .build()
        .unwrap()
}

pub fn banner_bidder(code: &str) -> Bidder {
    Bidder {
        code: code.to_string(),
        endpoint: format!("https://{}.example/rtb", code),
        gzip: false,
        multi_imp: true,
        qps: 0,
        info: BidderInfo {
            enabled: true,
            gvl_id: Some(10),
            site_media: vec![MediaType::Banner, MediaType::Video],
            app_media: vec![MediaType::Banner, MediaType::Video],
            ..Default::default()
        },
        usersync: None,
    }
}

pub fn enabled_publisher() -> Publisher {
    Publisher {
        id: "pub-1".to_string(),
        enabled: true,
        name: "Test Publisher".to_string(),
        floor: 0.0,
        domains: Vec::new(),
    }
}

fn build_bidder_contexts(codes: &[&str], req: &BidRequest) -> Vec<BidderContext> {
    codes
        .iter()
        .map(|code| {
            let bidder = banner_bidder(code);
            let (requests, build_errors) = StandardAdapter.make_requests(req, &bidder);

            BidderContext {
                bidder: Arc::new(bidder),
                adapter: Arc::new(StandardAdapter),
                callouts: requests.into_iter().map(BidderCallout::new).collect(),
                build_errors: build_errors.iter().map(|e| e.to_string()).collect(),
            }
        })
        .collect()
}

/// A context as it looks right after bidder matching: publisher and
/// privacy resolved, deadline stamped, callouts built
pub async fn matched_context(codes: Vec<&str>, tmax_ms: u64) -> AuctionContext {
    matched_context_with_deadline(
        codes,
        Instant::now() + Duration::from_millis(tmax_ms),
    )
    .await
}

pub async fn matched_context_with_deadline(
    codes: Vec<&str>,
    deadline: Instant,
) -> AuctionContext {
    let req = banner_request();

    let ctx = AuctionContext::new("test".to_string(), "pub-1".to_string(), req.clone());

    ctx.publisher.set(Arc::new(enabled_publisher())).ok();
    ctx.privacy
        .set(PrivacyDirectives::derive(&req, &PrivacyConfig::default()))
        .ok();
    ctx.deadline.set(deadline).ok();
    ctx.tmax_ms.set(1000).ok();

    *ctx.bidders.lock().await = build_bidder_contexts(&codes, &req);

    ctx
}
