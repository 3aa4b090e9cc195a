use crate::core::auth::AuthConfig;
use crate::core::breaker::BreakerPolicy;
use crate::core::events::RecorderConfig;
use crate::core::filters::IvtConfig;
use crate::core::models::bidder::Bidder;
use crate::core::models::publisher::Publisher;
use crate::core::observability::provider::LoggingConfig;
use crate::core::privacy::gate::PrivacyConfig;
use crate::core::ratelimit::RateLimitConfig;
use anyhow::{Error, bail};
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_port: u16,
    /// Hard cap on inbound request bodies
    pub max_body_bytes: usize,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            max_body_bytes: 256 * 1024,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Budget applied when the request carries no tmax
    #[serde(with = "humantime_serde")]
    pub tmax_default: Duration,
    /// Client tmax values are clamped to this ceiling
    #[serde(with = "humantime_serde")]
    pub max_tmax: Duration,
    /// Time reserved past the callout deadline for validation and
    /// settlement
    #[serde(with = "humantime_serde")]
    pub safety_margin: Duration,
    pub max_bidders: usize,
    /// Platform margin factor; floors exposed to bidders are floor
    /// times this, clearing prices are gross divided by it
    pub bid_multiplier: f64,
    /// Exchange-wide minimum floor in USD CPM
    pub min_floor: f64,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            tmax_default: Duration::from_secs(2),
            max_tmax: Duration::from_secs(5),
            safety_margin: Duration::from_millis(50),
            max_bidders: 15,
            bid_multiplier: 1.0,
            min_floor: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Comma-separated origin list; `*` refused when privacy
    /// enforcement is on
    pub allowed_origins: String,
}

impl CorsConfig {
    pub fn origins(&self) -> Vec<&str> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeoConfig {
    /// CIDR->location table; geo enrichment is off when unset
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub enabled: bool,
    /// Hard expiry stamped onto new sync entries
    #[serde(with = "humantime_serde")]
    pub entry_ttl: Duration,
    /// How long an inactive user's whole entry set survives
    #[serde(with = "humantime_serde")]
    pub user_ttl: Duration,
    /// Entries unused this long are purged by maintenance
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,
    pub max_syncs: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            entry_ttl: Duration::from_secs(30 * 24 * 3600),
            user_ttl: Duration::from_secs(7 * 24 * 3600),
            stale_after: Duration::from_secs(90 * 24 * 3600),
            max_syncs: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Public domain win/event pixels point back at
    pub domain: String,
    pub win_path: String,
    pub video_event_path: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            win_path: "/event/win".to_string(),
            video_event_path: "/video/event".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_device_sz: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_device_sz: 250_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ArxConfig {
    pub server: ServerConfig,
    pub auction: AuctionConfig,
    pub privacy: PrivacyConfig,
    pub ivt: IvtConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub breaker: BreakerPolicy,
    pub geo: GeoConfig,
    pub sync: SyncSettings,
    pub events: EventsConfig,
    pub recorder: RecorderConfig,
    pub caches: CacheConfig,
    pub bidders: Vec<Bidder>,
    pub publishers: Vec<Publisher>,
    pub logging: LoggingConfig,
}

/// The documented environment overrides, mapped onto their config keys
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("AUCTION_TIMEOUT", "auction.tmax_default"),
    ("AUCTION_MAX_TMAX", "auction.max_tmax"),
    ("AUCTION_MAX_BIDDERS", "auction.max_bidders"),
    ("BID_MULTIPLIER", "auction.bid_multiplier"),
    ("PBS_ENFORCE_GDPR", "privacy.enforce_gdpr"),
    ("PBS_ENFORCE_CCPA", "privacy.enforce_ccpa"),
    ("PBS_ENFORCE_COPPA", "privacy.enforce_coppa"),
    ("IVT_MONITORING_ENABLED", "ivt.monitoring_enabled"),
    ("IVT_BLOCKING_ENABLED", "ivt.blocking_enabled"),
    ("IVT_CHECK_UA", "ivt.check_ua"),
    ("IVT_CHECK_REFERER", "ivt.check_referer"),
    ("IVT_CHECK_GEO", "ivt.check_geo"),
    ("GEOIP2_DB_PATH", "geo.db_path"),
    ("RATE_LIMIT_GENERAL", "rate_limit.general"),
    ("RATE_LIMIT_AUCTION", "rate_limit.auction"),
    ("MAX_BODY_SIZE", "server.max_body_bytes"),
    ("CORS_ALLOWED_ORIGINS", "cors.allowed_origins"),
];

/// Comma-separated list overrides handled outside the scalar table
const ENV_LIST_OVERRIDES: &[(&str, &str)] = &[
    ("IVT_ALLOWED_COUNTRIES", "ivt.allowed_countries"),
    ("IVT_BLOCKED_COUNTRIES", "ivt.blocked_countries"),
];

impl ArxConfig {
    /// Loads the yaml file (optional - defaults apply without one)
    /// and layers the documented env overrides on top
    pub fn load(path: &PathBuf) -> Result<ArxConfig, Error> {
        let mut builder =
            Config::builder().add_source(config::File::from(path.clone()).required(false));

        for (env_name, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(env_name).ok())?;
        }

        for (env_name, key) in ENV_LIST_OVERRIDES {
            let values = std::env::var(env_name).ok().map(|raw| {
                raw.split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect::<Vec<_>>()
            });
            builder = builder.set_override_option(*key, values)?;
        }

        let cfg: ArxConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.logging.validate()?;

        if self.auction.bid_multiplier < 0.0 {
            bail!(
                "bid_multiplier cannot be negative, got {}",
                self.auction.bid_multiplier
            );
        }

        if self.auction.bid_multiplier > 0.0 && self.auction.bid_multiplier < 1.0 {
            warn!(
                "bid_multiplier {} is below 1.0 - publishers will be paid a premium over gross",
                self.auction.bid_multiplier
            );
        }

        if self.auction.safety_margin < Duration::from_millis(50) {
            bail!("safety_margin must be at least 50ms");
        }

        if self.server.max_body_bytes == 0 {
            bail!("max_body_bytes cannot be zero");
        }

        let privacy_on =
            self.privacy.enforce_gdpr || self.privacy.enforce_ccpa || self.privacy.enforce_coppa;

        if privacy_on && self.cors.origins().contains(&"*") {
            bail!("Wildcard CORS origin is not allowed while privacy enforcement is on");
        }

        for bidder in &self.bidders {
            if bidder.code.is_empty() || bidder.endpoint.is_empty() {
                bail!("Bidder entries need both a code and an endpoint url");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ArxConfig::default().validate().is_ok());
    }

    #[test]
    fn wildcard_cors_refused_under_privacy() {
        let mut cfg = ArxConfig::default();
        cfg.cors.allowed_origins = "https://pub.example, *".to_string();

        assert!(cfg.validate().is_err());

        cfg.privacy.enforce_gdpr = false;
        cfg.privacy.enforce_ccpa = false;
        cfg.privacy.enforce_coppa = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn thin_safety_margin_refused() {
        let mut cfg = ArxConfig::default();
        cfg.auction.safety_margin = Duration::from_millis(10);

        assert!(cfg.validate().is_err());
    }

    #[test]
    fn origins_split_and_trim() {
        let cors = CorsConfig {
            allowed_origins: "https://a.example , https://b.example,".to_string(),
        };

        assert_eq!(cors.origins(), vec!["https://a.example", "https://b.example"]);
    }
}
