//! Invalid-traffic screening. Cheap request-shape checks which run
//! before any money moves: UA sanity, referer presence, geo lists.
//! Monitoring mode records verdicts without blocking.

use crate::core::enrichment::device::{DeviceLookup, DeviceType};
use crate::core::ortb::BidRequest;
use serde::Deserialize;
use strum::Display;
use tracing::debug;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IvtConfig {
    pub monitoring_enabled: bool,
    /// When false, verdicts are recorded but nothing is blocked
    pub blocking_enabled: bool,
    pub check_ua: bool,
    pub check_referer: bool,
    pub check_geo: bool,
    /// Uppercase country codes; empty allows everything
    pub allowed_countries: Vec<String>,
    pub blocked_countries: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IvtVerdict {
    Clean,
    MissingUa,
    BotUa,
    MissingReferer,
    GeoNotAllowed,
    GeoBlocked,
}

pub struct IvtFilter {
    config: IvtConfig,
}

impl IvtFilter {
    pub fn new(mut config: IvtConfig) -> Self {
        for c in config
            .allowed_countries
            .iter_mut()
            .chain(config.blocked_countries.iter_mut())
        {
            *c = c.to_uppercase();
        }

        Self { config }
    }

    pub fn enabled(&self) -> bool {
        self.config.monitoring_enabled || self.config.blocking_enabled
    }

    pub fn blocking(&self) -> bool {
        self.config.blocking_enabled
    }

    /// Inspects a request and returns the first failing check
    pub fn inspect(&self, req: &BidRequest, device_lookup: &DeviceLookup) -> IvtVerdict {
        if !self.enabled() {
            return IvtVerdict::Clean;
        }

        if self.config.check_ua {
            let ua = req.device.as_ref().map(|d| d.ua.as_str()).unwrap_or("");

            if ua.trim().is_empty() {
                return IvtVerdict::MissingUa;
            }

            if let Some(info) = device_lookup.lookup_ua(ua) {
                if info.devtype == DeviceType::Bot {
                    debug!("UA classified as bot");
                    return IvtVerdict::BotUa;
                }
            }
        }

        if self.config.check_referer {
            let has_referer = req
                .site
                .as_ref()
                .map(|s| !s.page.is_empty() || !s.referrer.is_empty())
                .unwrap_or(true); // app traffic has no referer to check

            if !has_referer {
                return IvtVerdict::MissingReferer;
            }
        }

        if self.config.check_geo {
            let country = req
                .device
                .as_ref()
                .and_then(|d| d.geo.as_ref())
                .map(|g| g.country.to_uppercase())
                .unwrap_or_default();

            if self.config.blocked_countries.contains(&country) {
                return IvtVerdict::GeoBlocked;
            }

            if !self.config.allowed_countries.is_empty()
                && !self.config.allowed_countries.contains(&country)
            {
                return IvtVerdict::GeoNotAllowed;
            }
        }

        IvtVerdict::Clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ortb::{Device, Geo, Site};
    use std::num::NonZeroU32;
    use std::sync::OnceLock;

    fn lookup() -> &'static DeviceLookup {
        static LOOKUP: OnceLock<DeviceLookup> = OnceLock::new();
        LOOKUP.get_or_init(|| DeviceLookup::try_new(NonZeroU32::new(100).unwrap()).unwrap())
    }

    fn geo_config() -> IvtConfig {
        IvtConfig {
            monitoring_enabled: true,
            blocking_enabled: true,
            check_geo: true,
            allowed_countries: vec!["us".to_string(), "GB".to_string()],
            blocked_countries: vec!["kp".to_string()],
            ..Default::default()
        }
    }

    fn request_from(country: &str) -> BidRequest {
        BidRequest {
            id: "r1".to_string(),
            site: Some(Site {
                page: "https://pub.example/a".to_string(),
                ..Default::default()
            }),
            device: Some(Device {
                ua: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
                geo: Some(Geo {
                    country: country.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn geo_lists_are_case_normalized() {
        let filter = IvtFilter::new(geo_config());

        assert_eq!(filter.inspect(&request_from("US"), lookup()), IvtVerdict::Clean);
        assert_eq!(
            filter.inspect(&request_from("KP"), lookup()),
            IvtVerdict::GeoBlocked
        );
        assert_eq!(
            filter.inspect(&request_from("FR"), lookup()),
            IvtVerdict::GeoNotAllowed
        );
    }

    #[test]
    fn missing_ua_flags_when_checked() {
        let config = IvtConfig {
            monitoring_enabled: true,
            check_ua: true,
            ..Default::default()
        };
        let filter = IvtFilter::new(config);

        let mut req = request_from("US");
        req.device.as_mut().unwrap().ua.clear();

        assert_eq!(filter.inspect(&req, lookup()), IvtVerdict::MissingUa);
    }

    #[test]
    fn disabled_filter_is_always_clean() {
        let filter = IvtFilter::new(IvtConfig::default());
        let mut req = request_from("KP");
        req.device.as_mut().unwrap().ua.clear();

        assert_eq!(filter.inspect(&req, lookup()), IvtVerdict::Clean);
    }
}
