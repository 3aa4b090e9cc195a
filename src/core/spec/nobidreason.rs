//! Standard OpenRTB 2.x no-bid reason codes (BidResponse.nbr)

use crate::spec_list;

spec_list! {
    UNKNOWN_ERROR = 0 => "Unknown Error",
    TECHNICAL_ERROR = 1 => "Technical Error",
    INVALID_REQUEST = 2 => "Invalid Request",
    KNOWN_WEB_CRAWLER = 3 => "Known Web Crawler",
    SUSPECTED_NON_HUMAN = 4 => "Suspected Non-Human Traffic",
    CLOUD_PROXY_IP = 5 => "Cloud, Data Center, or Proxy IP",
    UNSUPPORTED_DEVICE = 6 => "Unsupported Device",
    BLOCKED_PUBLISHER = 7 => "Blocked Publisher or Site",
    UNMATCHED_USER = 8 => "Unmatched User",
    DAILY_USER_CAP = 9 => "Daily User Cap Met",
    DAILY_DOMAIN_CAP = 10 => "Daily Domain Cap Met",
    INSUFFICIENT_AUCTION_TIME = 11 => "Insufficient Auction Time",
}
