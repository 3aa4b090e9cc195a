use crate::core::adapters::adapter::{BidderAdapter, BidderHttpRequest};
use crate::core::economics::SettledPrice;
use crate::core::models::bidder::Bidder;
use crate::core::models::publisher::Publisher;
use crate::core::ortb::{Bid, BidRequest, BidResponseState, MediaType};
use crate::core::privacy::PrivacyDirectives;
use crate::core::usersync::SyncEntry;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use strum::Display;

/// Why a bidder never received a callout for this auction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExcludeReason {
    CircuitOpen,
    ConsentDenied,
    NoMatchingMedia,
    Disabled,
    TimeoutExceededBudget,
    RateLimited,
}

#[derive(Debug, Clone)]
pub struct ExcludedBidder {
    pub code: String,
    pub reason: ExcludeReason,
}

/// One parsed bid inside a callout response, carrying its settlement
/// state as the later stages fill it in
#[derive(Debug, Clone)]
pub struct BidContext {
    pub bid: Bid,
    pub media: Option<MediaType>,
    /// Price exactly as the bidder sent it
    pub original_price: f64,
    /// Set by the margin stage for bids surviving validation
    pub settled: Option<SettledPrice>,
    /// Set when validation or floors dropped the bid
    pub filter_reason: Option<String>,
}

/// Parsed outcome of one callout that came back with bids
#[derive(Debug, Clone, Default)]
pub struct BidsContext {
    pub response_id: String,
    pub currency: String,
    pub bids: Vec<BidContext>,
    /// Non-fatal adapter parse complaints
    pub errors: Vec<String>,
}

/// Terminal state of one callout
#[derive(Debug, Clone)]
pub enum BidderResponseState {
    Bid(BidsContext),
    NoBid,
    Timeout,
    Error(String),
}

impl BidderResponseState {
    pub fn status_label(&self) -> &'static str {
        match self {
            BidderResponseState::Bid(_) => "bid",
            BidderResponseState::NoBid => "no_bid",
            BidderResponseState::Timeout => "timeout",
            BidderResponseState::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalloutResponse {
    pub state: BidderResponseState,
    pub latency: Duration,
    pub status: u16,
}

/// One outbound request to one bidder endpoint. The response slot is
/// written exactly once by the fan-in, possibly concurrently with
/// other callouts - hence the OnceLock.
pub struct BidderCallout {
    pub http: BidderHttpRequest,
    pub response: OnceLock<CalloutResponse>,
}

impl BidderCallout {
    pub fn new(http: BidderHttpRequest) -> Self {
        Self {
            http,
            response: OnceLock::new(),
        }
    }
}

/// A selected bidder's slice of the auction: its adapter, its built
/// callouts, and whatever build errors the adapter reported
pub struct BidderContext {
    pub bidder: Arc<Bidder>,
    pub adapter: Arc<dyn BidderAdapter>,
    pub callouts: Vec<BidderCallout>,
    pub build_errors: Vec<String>,
}

/// A per-impression winner as chosen by settlement, before markup
/// post-processing and final response composition
#[derive(Debug, Clone)]
pub struct SettledWinner {
    pub impid: String,
    pub bidder: String,
    pub bid: Bid,
    pub media: MediaType,
    pub settled: SettledPrice,
    pub latency: Duration,
}

/// Top level auction context carrying all state required to run one
/// request through the pipeline.
///
/// # Concurrency
/// * `req` uses a sync RwLock - tasks never hold it across awaits
/// * `bidders` uses a tokio Mutex - the fan-out holds it across its
/// entire fan-in
/// * single-assignment results live in OnceLock slots
pub struct AuctionContext {
    /// Route which produced this auction (auction, video, ...)
    pub source: String,
    pub pubid: String,
    /// The id the caller sent; echoed back in responses
    pub original_auction_id: String,
    /// Our globally unique auction event id
    pub auction_id: String,
    pub received_at: Instant,
    pub received_wall: DateTime<Utc>,
    /// First-party user id from the exchange cookie, when present
    pub fpid: Option<String>,

    pub req: RwLock<BidRequest>,
    pub publisher: OnceLock<Arc<Publisher>>,
    pub privacy: OnceLock<PrivacyDirectives>,
    /// Set when privacy rules refuse the whole request (451)
    pub privacy_blocked: OnceLock<()>,
    /// Auction deadline derived from clamped tmax
    pub deadline: OnceLock<Instant>,
    pub tmax_ms: OnceLock<u64>,
    /// Per-bidder UIDs prefetched from the sync store
    pub sync_uids: OnceLock<HashMap<String, SyncEntry>>,

    pub bidders: tokio::sync::Mutex<Vec<BidderContext>>,
    pub excluded: Mutex<Vec<ExcludedBidder>>,
    pub validation_errors: Mutex<Vec<String>>,
    pub winners: Mutex<Vec<SettledWinner>>,

    pub res: OnceLock<BidResponseState>,
}

impl AuctionContext {
    pub fn new(source: String, pubid: String, req: BidRequest) -> AuctionContext {
        AuctionContext {
            source,
            pubid,
            original_auction_id: req.id.clone(),
            auction_id: uuid::Uuid::new_v4().to_string(),
            received_at: Instant::now(),
            received_wall: Utc::now(),
            fpid: None,
            req: RwLock::new(req),
            publisher: OnceLock::new(),
            privacy: OnceLock::new(),
            privacy_blocked: OnceLock::new(),
            deadline: OnceLock::new(),
            tmax_ms: OnceLock::new(),
            sync_uids: OnceLock::new(),
            bidders: tokio::sync::Mutex::new(Vec::new()),
            excluded: Mutex::new(Vec::new()),
            validation_errors: Mutex::new(Vec::new()),
            winners: Mutex::new(Vec::new()),
            res: OnceLock::new(),
        }
    }

    pub fn with_fpid(mut self, fpid: Option<String>) -> Self {
        self.fpid = fpid;
        self
    }

    pub fn exclude(&self, code: &str, reason: ExcludeReason) {
        self.excluded.lock().push(ExcludedBidder {
            code: code.to_string(),
            reason,
        });
    }

    pub fn record_validation_error(&self, error: String) {
        self.validation_errors.lock().push(error);
    }
}
