use crate::core::demand::encoding::Header;
use crate::core::models::bidder::Bidder;
use crate::core::ortb::{Bid, BidRequest, MediaType};
use anyhow::Error;

/// One fully-built outbound call: everything the dispatcher needs to
/// put it on the wire, plus the payload it was encoded from so bid
/// parsing can refer back to the impressions that were offered.
#[derive(Debug)]
pub struct BidderHttpRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
    /// The per-callout deep copy of the request. Adapters own this
    /// copy outright - mutations never reach other adapters or the
    /// original request.
    pub payload: BidRequest,
}

/// A parsed bid with its resolved (or claimed) media type
#[derive(Debug, Clone)]
pub struct TypedBid {
    pub bid: Bid,
    pub media: Option<MediaType>,
}

/// Typed result of parsing one raw bidder response body
#[derive(Debug, Clone, Default)]
pub struct AdapterBids {
    pub response_id: String,
    pub currency: String,
    pub bids: Vec<TypedBid>,
}

/// The uniform contract every demand source implements.
///
/// Both operations are pure: `make_requests` translates the normalized
/// request into outbound calls without performing I/O, and `make_bids`
/// parses a raw body the dispatcher already fetched. Errors are
/// returned by value and are never fatal to the auction - the
/// orchestrator records them and keeps going.
pub trait BidderAdapter: Send + Sync {
    fn make_requests(
        &self,
        req: &BidRequest,
        bidder: &Bidder,
    ) -> (Vec<BidderHttpRequest>, Vec<Error>);

    fn make_bids(&self, payload: &BidRequest, raw: &[u8]) -> (Option<AdapterBids>, Vec<Error>);
}
