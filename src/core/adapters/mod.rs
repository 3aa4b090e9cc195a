pub mod adapter;
pub mod registry;
pub mod standard;

pub use adapter::{AdapterBids, BidderAdapter, BidderHttpRequest, TypedBid};
pub use registry::{AdapterRegistry, RegisteredBidder};
pub use standard::StandardAdapter;
