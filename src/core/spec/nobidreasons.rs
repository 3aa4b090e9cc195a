//! Exchange-specific no-bid reason codes, kept in the >= 500 range
//! so they never collide with the standard OpenRTB values

use crate::spec_list;

spec_list! {
    /// No bidders survived capability and privacy prefiltering
    NO_BUYERS_PREMATCHED = 500 => "No Buyers Prematched",
    /// Callouts went out but nothing bid above the floor
    NO_CAMPAIGNS_FOUND = 501 => "No Campaigns Found",
    /// The publisher id is unrecognized
    UNKNOWN_SELLER = 502 => "Unknown Seller",
    SELLER_DISABLED = 503 => "Disabled Seller",
    THROTTLED_BUYER_QPS = 504 => "Throttled All Buyers For QPS",
    /// Consent rules excluded every bidder before fan-out
    CONSENT_DENIED_ALL = 505 => "Consent Denied All Buyers",
    /// Request device/ua/geo tripped invalid traffic rules
    INVALID_TRAFFIC = 506 => "Invalid Traffic",
    MISSING_DEVICE_DETAILS = 507 => "Missing Device Details",
    MISSING_DOMAIN_OR_BUNDLE = 508 => "Missing Domain Or Bundle",
}
