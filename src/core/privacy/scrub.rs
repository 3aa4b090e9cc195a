//! COPPA anonymization: truncate IPs, drop age/gender signals and
//! fine-grained geo so nothing identifying leaves the exchange

use crate::core::ortb::BidRequest;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// Zeroes the host portion of an IPv4 address to /24. Unparseable
/// input is cleared entirely rather than passed through.
pub fn anonymize_ipv4(ip: &str) -> String {
    match ip.parse::<Ipv4Addr>() {
        Ok(addr) => {
            let o = addr.octets();
            Ipv4Addr::new(o[0], o[1], o[2], 0).to_string()
        }
        Err(_) => String::new(),
    }
}

/// Truncates an IPv6 address to its /48 prefix
pub fn anonymize_ipv6(ip: &str) -> String {
    match ip.parse::<Ipv6Addr>() {
        Ok(addr) => {
            let s = addr.segments();
            Ipv6Addr::new(s[0], s[1], s[2], 0, 0, 0, 0, 0).to_string()
        }
        Err(_) => String::new(),
    }
}

/// In-place COPPA scrub of a request before any adapter sees it
pub fn scrub_request(req: &mut BidRequest) {
    if let Some(device) = req.device.as_mut() {
        if !device.ip.is_empty() {
            device.ip = anonymize_ipv4(&device.ip);
        }
        if !device.ipv6.is_empty() {
            device.ipv6 = anonymize_ipv6(&device.ipv6);
        }

        device.ifa.clear();

        if let Some(geo) = device.geo.as_mut() {
            geo.lat = None;
            geo.lon = None;
            geo.zip.clear();
            geo.metro.clear();
        }
    }

    if let Some(user) = req.user.as_mut() {
        user.yob = None;
        user.gender.clear();
        user.buyeruid.clear();
        user.eids.clear();

        if let Some(geo) = user.geo.as_mut() {
            geo.lat = None;
            geo.lon = None;
            geo.zip.clear();
        }
    }

    debug!("Applied coppa scrub to request {}", req.id);
}
