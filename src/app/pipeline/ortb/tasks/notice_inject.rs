use crate::app::config::EventsConfig;
use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::ortb::tasks::notices;
use crate::child_span_info;
use crate::core::ortb::MediaType;
use crate::core::pipeline::AsyncTask;
use crate::core::vast::builder::substitute_price_macros;
use anyhow::Error;
use async_trait::async_trait;
use tracing::{Instrument, debug, warn};

/// Stamps win notification pixels into non-video winners' markup and
/// substitutes price macros across markup and notice urls. Video
/// winners were already handled by the VAST stage.
pub struct NoticeInjectTask {
    events: EventsConfig,
}

impl NoticeInjectTask {
    pub fn new(events: EventsConfig) -> Self {
        Self { events }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let mut winners = context.winners.lock();

        for winner in winners.iter_mut() {
            let clearing = winner.settled.adjusted;

            if !winner.bid.nurl.is_empty() {
                winner.bid.nurl = substitute_price_macros(&winner.bid.nurl, clearing);
            }
            if !winner.bid.burl.is_empty() {
                winner.bid.burl = substitute_price_macros(&winner.bid.burl, clearing);
            }

            if winner.media == MediaType::Video {
                continue;
            }

            winner.bid.adm = substitute_price_macros(&winner.bid.adm, clearing);

            if winner.media != MediaType::Banner {
                continue;
            }

            let win_url = match notices::build_win_url(
                &self.events,
                &context.auction_id,
                &context.pubid,
                winner,
            ) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Failed building win pixel for {}: {}", winner.bid.id, e);
                    continue;
                }
            };

            // pixel url went through the DataUrl encoder; the img
            // attribute only needs ampersands escaped
            let pixel = format!(
                "<img src=\"{}\" height=\"1\" width=\"1\" style=\"display:none\"/>",
                win_url.replace('&', "&amp;")
            );

            winner.bid.adm.push_str(&pixel);

            debug!("Injected win pixel into winner {}", winner.bid.id);
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for NoticeInjectTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("notice_inject_task");

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::ortb::context::SettledWinner;
    use crate::core::economics;
    use crate::core::ortb::Bid;
    use crate::test_support::fixtures;
    use std::time::Duration;

    #[tokio::test]
    async fn banner_winner_gets_pixel_and_macro_substitution() {
        let ctx = AuctionContext::new(
            "test".to_string(),
            "pub-1".to_string(),
            fixtures::banner_request(),
        );

        *ctx.winners.lock() = vec![SettledWinner {
            impid: "1".to_string(),
            bidder: "dsp-a".to_string(),
            bid: Bid {
                id: "b-1".to_string(),
                impid: "1".to_string(),
                price: 2.0,
                adm: "<div data-price=\"${AUCTION_PRICE}\">ad</div>".to_string(),
                nurl: "https://dsp-a.example/win?p=${AUCTION_PRICE}".to_string(),
                ..Default::default()
            },
            media: MediaType::Banner,
            settled: economics::settle_bid(2.0, 1.0),
            latency: Duration::from_millis(50),
        }];

        NoticeInjectTask::new(EventsConfig::default())
            .run0(&ctx)
            .await
            .unwrap();

        let winners = ctx.winners.lock();
        assert!(winners[0].bid.adm.contains("data-price=\"2.00\""));
        assert!(winners[0].bid.adm.contains("<img src=\"https://localhost/event/win?"));
        assert!(winners[0].bid.nurl.contains("p=2.00"));
    }
}
