use crate::core::events::dataurl::DataUrl;
use anyhow::Error;
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Outcome of one bidder's participation in one auction
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
pub struct BidderOutcomeRecord {
    pub bidder: String,
    /// bid | no_bid | timeout | error | excluded
    pub status: String,
    pub latency_ms: u64,
    pub bids: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
pub struct WinnerRecord {
    pub impid: String,
    pub bidder: String,
    pub bid_id: String,
    pub media: String,
    pub gross_price: f64,
    pub clearing_price: f64,
    pub platform_cut: f64,
}

/// The immutable analytics view of a finished auction. Built once
/// after response finalization and deep-copied into the recorder.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
pub struct AuctionRecord {
    pub auction_id: String,
    pub pubid: String,
    pub received_at: DateTime<Utc>,
    pub tmax_ms: u64,
    /// site | app
    pub channel: String,
    pub selected: Vec<String>,
    /// (bidder, exclusion reason) pairs
    pub excluded: Vec<(String, String)>,
    pub bidders: Vec<BidderOutcomeRecord>,
    pub winners: Vec<WinnerRecord>,
    /// Platform revenue attributed to this auction
    pub revenue: f64,
    pub gdpr: bool,
    pub ccpa: bool,
    pub coppa: bool,
    pub validation_errors: Vec<String>,
    /// success | no_bids | error
    pub outcome: String,
}

/// Url param keys for win event pixels
pub const FIELD_AUCTION_ID: &str = "aid";
pub const FIELD_BID_ID: &str = "bid";
pub const FIELD_BIDDER: &str = "b";
pub const FIELD_PUB_ID: &str = "p";
pub const FIELD_IMP_ID: &str = "i";
pub const FIELD_CLEARING_PRICE: &str = "cp";
pub const FIELD_GROSS_PRICE: &str = "gp";
pub const FIELD_MEDIA: &str = "m";
pub const FIELD_TIMESTAMP: &str = "ts";

/// A delivered/billable win, decoded from the notification pixel we
/// injected into the winner's markup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
pub struct WinEvent {
    pub auction_id: String,
    pub bid_id: String,
    pub bidder: String,
    pub pubid: String,
    pub impid: String,
    pub clearing_price: f64,
    pub gross_price: f64,
    pub media: String,
    pub bid_timestamp: u64,
}

impl WinEvent {
    /// Extracts a well structured ['WinEvent'] from a ['DataUrl']
    pub fn from(data_url: &DataUrl) -> Result<Self, Error> {
        Ok(WinEventBuilder::default()
            .auction_id(data_url.get_required_string(FIELD_AUCTION_ID)?)
            .bid_id(data_url.get_required_string(FIELD_BID_ID)?)
            .bidder(data_url.get_required_string(FIELD_BIDDER)?)
            .pubid(data_url.get_required_string(FIELD_PUB_ID)?)
            .impid(data_url.get_required_string(FIELD_IMP_ID)?)
            .clearing_price(data_url.get_required_float(FIELD_CLEARING_PRICE)?)
            .gross_price(data_url.get_required_float(FIELD_GROSS_PRICE)?)
            .media(data_url.get_required_string(FIELD_MEDIA)?)
            .bid_timestamp(data_url.get_required_int(FIELD_TIMESTAMP)? as u64)
            .build()?)
    }

    /// Writes the win event field/value pairs into a ['DataUrl']
    pub fn write_to(&self, data_url: &mut DataUrl) -> Result<(), Error> {
        data_url
            .add_string(FIELD_AUCTION_ID, &self.auction_id)?
            .add_string(FIELD_BID_ID, &self.bid_id)?
            .add_string(FIELD_BIDDER, &self.bidder)?
            .add_string(FIELD_PUB_ID, &self.pubid)?
            .add_string(FIELD_IMP_ID, &self.impid)?
            .add_float(FIELD_CLEARING_PRICE, self.clearing_price)?
            .add_float(FIELD_GROSS_PRICE, self.gross_price)?
            .add_string(FIELD_MEDIA, &self.media)?
            .add_int(FIELD_TIMESTAMP, self.bid_timestamp as i64)?;
        Ok(())
    }
}

/// Everything the recorder buffers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRecord {
    Auction(AuctionRecord),
    Win(WinEvent),
}
