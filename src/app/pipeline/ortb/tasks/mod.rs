mod validate;
pub use validate::ValidateRequestTask;

mod pub_lookup;
pub use pub_lookup::PubLookupTask;

mod deadline;
pub use deadline::DeadlineTask;

mod normalize;
pub use normalize::NormalizeRequestTask;

mod ivt_filter;
pub use ivt_filter::IvtFilterTask;

mod device_lookup;
pub use device_lookup::DeviceLookupTask;

mod geo_lookup;
pub use geo_lookup::GeoLookupTask;

mod privacy_gate;
pub use privacy_gate::PrivacyGateTask;

mod identity;
pub use identity::IdentityDemandTask;

mod floors_markup;
pub use floors_markup::FloorsMarkupTask;

mod bidder_matching;
pub use bidder_matching::BidderMatchingTask;

mod bidder_callouts;
pub use bidder_callouts::BidderCalloutsTask;

mod bid_validation;
pub use bid_validation::BidValidationTask;

mod margin;
pub use margin::BidMarginTask;

mod bid_settlement;
pub use bid_settlement::BidSettlementTask;

mod vast_markup;
pub use vast_markup::VastMarkupTask;

mod notice_inject;
pub use notice_inject::NoticeInjectTask;

mod compose_response;
pub use compose_response::ComposeResponseTask;

mod record_auction;
pub use record_auction::RecordAuctionTask;

pub mod notices;
