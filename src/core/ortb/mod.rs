//! Hand-written OpenRTB 2.x model, JSON wire format.
//!
//! Dynamic `ext` payloads are carried as opaque [`serde_json::Value`]
//! blobs and parsed on demand by whoever owns the extension - no attempt
//! is made to unify them into typed structs.

pub mod request;
pub mod response;
pub mod state;

pub use request::{
    App, Audio, Banner, BidRequest, BidRequestBuilder, Deal, Device, Eid, Format, Geo, Imp,
    ImpBuilder, Pmp, Publisher, Regs, Site, Source, Uid, User, Video,
};
pub use response::{Bid, BidBuilder, BidResponse, BidResponseBuilder, SeatBid, SeatBidBuilder};
pub use state::BidResponseState;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Ad media types an impression can offer and a bid can claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
    Audio,
    Native,
}

impl MediaType {
    /// Maps the OpenRTB 2.6 `bid.mtype` value
    pub fn from_mtype(mtype: u32) -> Option<MediaType> {
        match mtype {
            1 => Some(MediaType::Banner),
            2 => Some(MediaType::Video),
            3 => Some(MediaType::Audio),
            4 => Some(MediaType::Native),
            _ => None,
        }
    }
}

pub(crate) fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

pub(crate) fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

pub(crate) fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}
