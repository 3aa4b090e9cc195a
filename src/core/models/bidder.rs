use crate::core::ortb::MediaType;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What kind of demand sits behind a bidder endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default, EnumString, Display, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DemandKind {
    #[default]
    Dsp,
    Network,
    Exchange,
}

/// How a bidder's user-sync pixel is rendered on the client
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, EnumString, Display, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncKind {
    #[default]
    Redirect,
    Iframe,
    Image,
}

/// Bidder-hosted user sync endpoint. The url carries the local-uid
/// macro which we substitute before handing it to the client.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
pub struct SyncConfig {
    pub kind: SyncKind,
    pub url: String,
}

/// Static capability metadata every demand source declares
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
pub struct BidderInfo {
    pub enabled: bool,
    /// TCF Global Vendor List id, None for bidders outside the GVL
    pub gvl_id: Option<u16>,
    /// Media types supported for site inventory
    pub site_media: Vec<MediaType>,
    /// Media types supported for app inventory
    pub app_media: Vec<MediaType>,
    pub maintainer: String,
    pub demand_kind: DemandKind,
}

/// One configured demand partner
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
pub struct Bidder {
    /// Stable bidder code, the registry key and seat name
    pub code: String,
    /// Outbound auction endpoint url
    pub endpoint: String,
    #[builder(default = "true")]
    pub gzip: bool,
    /// Whether the endpoint accepts multi-imp requests; when false
    /// callouts are broken out to one imp per request
    #[builder(default = "true")]
    pub multi_imp: bool,
    /// Outbound QPS cap, 0 for unlimited
    pub qps: u32,
    pub info: BidderInfo,
    pub usersync: Option<SyncConfig>,
}

impl Bidder {
    /// Media types this bidder accepts for the given inventory context
    pub fn media_for_channel(&self, is_app: bool) -> &[MediaType] {
        if is_app {
            &self.info.app_media
        } else {
            &self.info.site_media
        }
    }
}
