//! The privacy gate: derives the jurisdiction flags for a request and
//! answers per-bidder consent questions. Parse failures always deny.

use crate::core::models::bidder::BidderInfo;
use crate::core::ortb::BidRequest;
use crate::core::privacy::tcf::TcfConsent;
use crate::core::privacy::usp::UsPrivacy;
use serde::Deserialize;
use tracing::{debug, warn};

/// EU/EEA plus UK, ISO 3166-1 alpha-2 and alpha-3 both accepted
const EEA_COUNTRIES: &[&str] = &[
    "AT", "AUT", "BE", "BEL", "BG", "BGR", "HR", "HRV", "CY", "CYP", "CZ", "CZE", "DK", "DNK",
    "EE", "EST", "FI", "FIN", "FR", "FRA", "DE", "DEU", "GR", "GRC", "HU", "HUN", "IS", "ISL",
    "IE", "IRL", "IT", "ITA", "LV", "LVA", "LI", "LIE", "LT", "LTU", "LU", "LUX", "MT", "MLT",
    "NL", "NLD", "NO", "NOR", "PL", "POL", "PT", "PRT", "RO", "ROU", "SK", "SVK", "SI", "SVN",
    "ES", "ESP", "SE", "SWE", "GB", "GBR",
];

/// US states with CCPA-family privacy statutes
const US_PRIVACY_STATES: &[&str] = &["CA", "VA", "CO", "CT", "UT"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub enforce_gdpr: bool,
    pub enforce_ccpa: bool,
    pub enforce_coppa: bool,
    /// When set, EU-geo requests without an explicit gdpr=1 flag are
    /// refused outright (451 semantics)
    pub geo_block: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            enforce_gdpr: true,
            enforce_ccpa: true,
            enforce_coppa: true,
            geo_block: false,
        }
    }
}

/// Per-request privacy decision state, derived once before bidder
/// selection and read-only afterwards
#[derive(Debug, Default)]
pub struct PrivacyDirectives {
    pub gdpr_applies: bool,
    pub ccpa_applies: bool,
    pub coppa: bool,
    /// Parsed consent string when present and valid
    pub consent: Option<TcfConsent>,
    /// A consent string was on the request (even if it failed to parse)
    pub consent_present: bool,
    pub ccpa_opt_out: bool,
    /// Request must be refused entirely (geo enforcement)
    pub blocked: bool,
}

impl PrivacyDirectives {
    /// Derives all flags for a request. Jurisdiction falls back to the
    /// device geo when the request does not carry explicit signals.
    pub fn derive(req: &BidRequest, cfg: &PrivacyConfig) -> PrivacyDirectives {
        let country = req
            .device
            .as_ref()
            .and_then(|d| d.geo.as_ref())
            .map(|g| g.country.to_uppercase())
            .unwrap_or_default();

        let region = req
            .device
            .as_ref()
            .and_then(|d| d.geo.as_ref())
            .map(|g| g.region.to_uppercase())
            .unwrap_or_default();

        let gdpr_flag = req.regs.as_ref().and_then(|r| r.gdpr_flag());
        let in_eea = EEA_COUNTRIES.contains(&country.as_str());

        let gdpr_applies = cfg.enforce_gdpr
            && match gdpr_flag {
                Some(flag) => flag == 1,
                None => in_eea,
            };

        let usp_raw = req
            .regs
            .as_ref()
            .and_then(|r| r.us_privacy_string())
            .map(|s| s.to_string());

        let in_us_privacy_state = (country == "US" || country == "USA")
            && US_PRIVACY_STATES.contains(&region.as_str());

        let ccpa_applies = cfg.enforce_ccpa && (usp_raw.is_some() || in_us_privacy_state);

        let ccpa_opt_out = match &usp_raw {
            Some(raw) => match UsPrivacy::parse(raw) {
                Ok(usp) => usp.is_opt_out(),
                Err(e) => {
                    // unreadable signal, treat as opted out
                    warn!("US-Privacy string failed to parse, denying: {}", e);
                    true
                }
            },
            None => false,
        };

        let coppa = cfg.enforce_coppa
            && req.regs.as_ref().and_then(|r| r.coppa).unwrap_or(0) == 1;

        let consent_raw = req
            .user
            .as_ref()
            .and_then(|u| u.consent_string())
            .map(|s| s.to_string());

        let consent_present = consent_raw.is_some();

        let consent = consent_raw.and_then(|raw| match TcfConsent::parse(&raw) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Consent string failed to parse, failing closed: {}", e);
                None
            }
        });

        let blocked = cfg.geo_block && in_eea && gdpr_flag != Some(1);

        PrivacyDirectives {
            gdpr_applies,
            ccpa_applies: ccpa_applies && cfg.enforce_ccpa,
            coppa,
            consent,
            consent_present,
            ccpa_opt_out: cfg.enforce_ccpa && ccpa_opt_out,
            blocked,
        }
    }

    /// Derives directives from bare query-string signals, as the
    /// cookie-sync endpoints receive them. No geo fallback here - a
    /// sync call without explicit signals is unregulated.
    pub fn derive_from_signals(
        gdpr: Option<&str>,
        consent: Option<&str>,
        us_privacy: Option<&str>,
        cfg: &PrivacyConfig,
    ) -> PrivacyDirectives {
        let gdpr_applies = cfg.enforce_gdpr && gdpr == Some("1");

        let consent_present = consent.map(|c| !c.is_empty()).unwrap_or(false);

        let parsed = consent
            .filter(|c| !c.is_empty())
            .and_then(|raw| match TcfConsent::parse(raw) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("Sync consent string failed to parse, failing closed: {}", e);
                    None
                }
            });

        let ccpa_opt_out = cfg.enforce_ccpa
            && match us_privacy.filter(|s| !s.is_empty()) {
                Some(raw) => UsPrivacy::parse(raw).map(|u| u.is_opt_out()).unwrap_or(true),
                None => false,
            };

        PrivacyDirectives {
            gdpr_applies,
            ccpa_applies: cfg.enforce_ccpa && us_privacy.is_some(),
            coppa: false,
            consent: parsed,
            consent_present,
            ccpa_opt_out,
            blocked: false,
        }
    }

    /// Whether a bidder may receive this request at all. Evaluated in
    /// rule order; the first failing rule denies.
    pub fn bidder_allowed(&self, info: &BidderInfo) -> bool {
        if self.gdpr_applies {
            if !self.consent_present {
                return false;
            }

            let consent = match &self.consent {
                Some(consent) => consent,
                // present but unparseable: fail closed
                None => return false,
            };

            let vendor_ok = match info.gvl_id {
                Some(gvl_id) => consent.vendor_consent(gvl_id),
                // not on the vendor list at all
                None => false,
            };

            if !vendor_ok {
                return false;
            }
        }

        if self.ccpa_opt_out {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ortb::{Device, Geo, Regs, User};

    fn base_request() -> BidRequest {
        BidRequest {
            id: "r1".to_string(),
            device: Some(Device {
                geo: Some(Geo {
                    country: "DEU".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn gdpr_inferred_from_eea_geo() {
        let d = PrivacyDirectives::derive(&base_request(), &PrivacyConfig::default());
        assert!(d.gdpr_applies);
    }

    #[test]
    fn explicit_flag_wins_over_geo() {
        let mut req = base_request();
        req.regs = Some(Regs {
            gdpr: Some(0),
            ..Default::default()
        });

        let d = PrivacyDirectives::derive(&req, &PrivacyConfig::default());
        assert!(!d.gdpr_applies);
    }

    #[test]
    fn gdpr_without_consent_denies_every_bidder() {
        let mut req = base_request();
        req.regs = Some(Regs {
            gdpr: Some(1),
            ..Default::default()
        });

        let d = PrivacyDirectives::derive(&req, &PrivacyConfig::default());
        let info = BidderInfo {
            gvl_id: Some(52),
            ..Default::default()
        };

        assert!(!d.bidder_allowed(&info));
    }

    #[test]
    fn gdpr_with_garbage_consent_fails_closed() {
        let mut req = base_request();
        req.regs = Some(Regs {
            gdpr: Some(1),
            ..Default::default()
        });
        req.user = Some(User {
            consent: "!!not-a-consent-string!!".to_string(),
            ..Default::default()
        });

        let d = PrivacyDirectives::derive(&req, &PrivacyConfig::default());
        assert!(d.consent_present);
        assert!(d.consent.is_none());

        let info = BidderInfo {
            gvl_id: Some(52),
            ..Default::default()
        };
        assert!(!d.bidder_allowed(&info));
    }

    #[test]
    fn ccpa_opt_out_denies_all() {
        let mut req = base_request();
        req.device.as_mut().unwrap().geo.as_mut().unwrap().country = "US".to_string();
        req.regs = Some(Regs {
            us_privacy: "1YYN".to_string(),
            ..Default::default()
        });

        let d = PrivacyDirectives::derive(&req, &PrivacyConfig::default());
        assert!(d.ccpa_opt_out);
        assert!(!d.bidder_allowed(&BidderInfo::default()));
    }

    #[test]
    fn non_regulated_request_allows_unlisted_bidders() {
        let mut req = base_request();
        req.device.as_mut().unwrap().geo.as_mut().unwrap().country = "BRA".to_string();

        let d = PrivacyDirectives::derive(&req, &PrivacyConfig::default());
        assert!(!d.gdpr_applies);
        assert!(d.bidder_allowed(&BidderInfo::default()));
    }

    #[test]
    fn geo_block_refuses_unflagged_eu_traffic() {
        let cfg = PrivacyConfig {
            geo_block: true,
            ..Default::default()
        };

        let d = PrivacyDirectives::derive(&base_request(), &cfg);
        assert!(d.blocked);

        let mut flagged = base_request();
        flagged.regs = Some(Regs {
            gdpr: Some(1),
            ..Default::default()
        });
        let d = PrivacyDirectives::derive(&flagged, &cfg);
        assert!(!d.blocked);
    }

    #[test]
    fn coppa_flag_derived_from_regs() {
        let mut req = base_request();
        req.regs = Some(Regs {
            coppa: Some(1),
            ..Default::default()
        });

        let d = PrivacyDirectives::derive(&req, &PrivacyConfig::default());
        assert!(d.coppa);
    }
}
