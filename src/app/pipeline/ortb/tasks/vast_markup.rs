use crate::app::config::EventsConfig;
use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::tasks::notices;
use crate::child_span_info;
use crate::core::pipeline::AsyncTask;
use crate::core::vast::model::{VastAd, VastDocument, VastVersion, WrapperAd};
use crate::core::vast::{builder, parser};
use crate::core::ortb::MediaType;
use anyhow::Error;
use async_trait::async_trait;
use tracing::{Instrument, debug, warn};

const EXCHANGE_AD_SYSTEM: &str = "arx";

/// Rewrites each video winner's markup into tracked VAST: the bidder's
/// own document when it sent one (`adm`), a wrapper pointing at its
/// `nurl` otherwise. Our impression/error pixels and the standard
/// tracking events are injected, and price macros are substituted with
/// the clearing price.
pub struct VastMarkupTask {
    events: EventsConfig,
}

impl VastMarkupTask {
    pub fn new(events: EventsConfig) -> Self {
        Self { events }
    }

    fn build_document(
        &self,
        adm: &str,
        nurl: &str,
        clearing_price: f64,
    ) -> Result<VastDocument, Error> {
        if !adm.trim().is_empty() {
            return parser::parse(adm);
        }

        Ok(VastDocument {
            version: VastVersion::V3_0,
            ad_id: String::new(),
            ad: VastAd::Wrapper(WrapperAd {
                ad_system: EXCHANGE_AD_SYSTEM.to_string(),
                vast_ad_tag_uri: builder::substitute_price_macros(nurl, clearing_price),
                ..Default::default()
            }),
        })
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let mut winners = context.winners.lock();

        for winner in winners.iter_mut().filter(|w| w.media == MediaType::Video) {
            let clearing = winner.settled.adjusted;

            let mut doc = match self.build_document(&winner.bid.adm, &winner.bid.nurl, clearing) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(
                        "Winner {} markup is not usable VAST, leaving as-is: {}",
                        winner.bid.id, e
                    );
                    context
                        .record_validation_error(format!("vast: {}: {}", winner.bid.id, e));
                    continue;
                }
            };

            if doc.ad_id.is_empty() {
                doc.ad_id = winner.bid.id.clone();
            }

            let impression_url =
                notices::build_win_url(&self.events, &context.auction_id, &context.pubid, winner)?;
            let error_url =
                notices::build_video_error_url(&self.events, &winner.bid.id, &context.pubid)?;

            let bid_id = winner.bid.id.clone();
            let pubid = context.pubid.clone();
            let events = self.events.clone();

            builder::inject_tracking(
                &mut doc,
                &impression_url,
                &error_url,
                |event| {
                    notices::build_video_event_url(&events, event, &bid_id, &pubid)
                        .unwrap_or_default()
                },
                clearing,
            );

            let xml = builder::generate(&doc)?;
            let xml = builder::substitute_price_macros(&xml, clearing);

            debug!("Rewrote winner {} markup into tracked VAST", winner.bid.id);

            winner.bid.adm = xml;
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for VastMarkupTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("vast_markup_task");

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::ortb::context::SettledWinner;
    use crate::core::economics;
    use crate::core::ortb::Bid;
    use crate::core::vast::parser::parse;
    use crate::test_support::fixtures;
    use std::time::Duration;

    fn video_winner(adm: &str, nurl: &str) -> SettledWinner {
        SettledWinner {
            impid: "1".to_string(),
            bidder: "dsp-a".to_string(),
            bid: Bid {
                id: "b-1".to_string(),
                impid: "1".to_string(),
                price: 2.2,
                adm: adm.to_string(),
                nurl: nurl.to_string(),
                ..Default::default()
            },
            media: MediaType::Video,
            settled: economics::settle_bid(2.2, 1.1),
            latency: Duration::from_millis(80),
        }
    }

    #[tokio::test]
    async fn nurl_only_winner_becomes_a_wrapper() {
        let ctx = AuctionContext::new(
            "test".to_string(),
            "pub-1".to_string(),
            fixtures::banner_request(),
        );

        *ctx.winners.lock() = vec![video_winner(
            "",
            "https://dsp-a.example/vast?price=${AUCTION_PRICE}",
        )];

        VastMarkupTask::new(EventsConfig::default())
            .run0(&ctx)
            .await
            .unwrap();

        let winners = ctx.winners.lock();
        let doc = parse(&winners[0].bid.adm).unwrap();

        let VastAd::Wrapper(wrapper) = &doc.ad else {
            panic!("expected wrapper");
        };

        // macro substituted with the clearing (adjusted) price
        assert!(wrapper.vast_ad_tag_uri.contains("price=2.00"));
        assert_eq!(wrapper.impressions.len(), 1, "win pixel injected");
        assert!(!wrapper.tracking.is_empty(), "standard events injected");
    }

    #[tokio::test]
    async fn inline_adm_gets_pixels_injected() {
        let inline = r#"<VAST version="3.0"><Ad id="x"><InLine>
            <AdSystem>dsp-a</AdSystem><AdTitle>spot</AdTitle>
            <Creatives><Creative><Linear>
            <Duration>00:00:15</Duration>
            <MediaFiles><MediaFile delivery="progressive" type="video/mp4" width="640" height="480"><![CDATA[https://cdn.example/a.mp4]]></MediaFile></MediaFiles>
            </Linear></Creative></Creatives>
        </InLine></Ad></VAST>"#;

        let ctx = AuctionContext::new(
            "test".to_string(),
            "pub-1".to_string(),
            fixtures::banner_request(),
        );

        *ctx.winners.lock() = vec![video_winner(inline, "")];

        VastMarkupTask::new(EventsConfig::default())
            .run0(&ctx)
            .await
            .unwrap();

        let winners = ctx.winners.lock();
        let doc = parse(&winners[0].bid.adm).unwrap();

        let VastAd::Inline(inline) = &doc.ad else {
            panic!("expected inline");
        };

        assert_eq!(inline.duration_secs, 15, "bidder creative preserved");
        assert_eq!(inline.impressions.len(), 1);
        assert!(inline.error_urls[0].contains("code=[ERRORCODE]"));
    }
}
