//! Builders for the notification urls we pin onto winning markup.

use crate::app::config::EventsConfig;
use crate::app::pipeline::ortb::context::SettledWinner;
use crate::core::events::dataurl::DataUrl;
use crate::core::events::model::WinEvent;
use crate::core::usersync::model::epoch_seconds;
use anyhow::Error;

/// The win pixel: decoded by the win-event endpoint into a
/// ['WinEvent'] for billing and win-stats
pub fn build_win_url(
    events: &EventsConfig,
    auction_id: &str,
    pubid: &str,
    winner: &SettledWinner,
) -> Result<String, Error> {
    let event = WinEvent {
        auction_id: auction_id.to_string(),
        bid_id: winner.bid.id.clone(),
        bidder: winner.bidder.clone(),
        pubid: pubid.to_string(),
        impid: winner.impid.clone(),
        clearing_price: winner.settled.adjusted,
        gross_price: winner.settled.gross,
        media: winner.media.to_string(),
        bid_timestamp: epoch_seconds(),
    };

    let mut url = DataUrl::new(&events.domain, &events.win_path)?;
    event.write_to(&mut url)?;
    url.finalize();

    url.url(true)
}

/// A quartile/interaction tracking url for video playback events
pub fn build_video_event_url(
    events: &EventsConfig,
    event: &str,
    bid_id: &str,
    pubid: &str,
) -> Result<String, Error> {
    let mut url = DataUrl::new(&events.domain, &events.video_event_path)?;
    url.add_string("event", event)?
        .add_string("bid_id", bid_id)?
        .add_string("account_id", pubid)?;
    url.finalize();

    url.url(true)
}

/// The video error pixel. The player fills [ERRORCODE]; everything we
/// substitute ourselves goes through the encoder.
pub fn build_video_error_url(
    events: &EventsConfig,
    bid_id: &str,
    pubid: &str,
) -> Result<String, Error> {
    let base = build_video_event_url(events, "error", bid_id, pubid)?;

    Ok(format!("{}&msg=%5BERRORCODE%5D&code=[ERRORCODE]", base))
}
