use crate::core::models::bidder::SyncKind;
use crate::core::privacy::PrivacyDirectives;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Consent signals as they arrive on the sync endpoints' query string
#[derive(Debug, Default, Clone)]
pub struct ConsentParams {
    pub gdpr: Option<String>,
    pub gdpr_consent: Option<String>,
    pub us_privacy: Option<String>,
    pub gpp: Option<String>,
    pub gpp_sid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncMethod {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SyncKind,
}

#[derive(Debug, Serialize)]
pub struct SyncBidderEntry {
    pub bidder: String,
    pub usersync: SyncMethod,
}

/// The JSON body `/cookie_sync` answers with
#[derive(Debug, Serialize)]
pub struct SyncOutResponse {
    pub status: &'static str,
    pub bidders: Vec<SyncBidderEntry>,
}

/// Context for the pipeline serving `/cookie_sync`: pick which
/// bidders the caller should sync next
#[derive(Default)]
pub struct SyncOutContext {
    pub params: ConsentParams,
    /// Cookies extracted from the http request
    pub cookies: HashMap<String, String>,
    /// The first-party ID for this user, existing or freshly minted
    pub fpid: OnceLock<String>,
    /// Set when we minted a new fpid and the handler must drop the cookie
    pub minted: OnceLock<()>,
    pub privacy: OnceLock<PrivacyDirectives>,
    pub response: OnceLock<SyncOutResponse>,
}

impl SyncOutContext {
    pub fn new(params: ConsentParams, cookies: HashMap<String, String>) -> SyncOutContext {
        Self {
            params,
            cookies,
            ..Default::default()
        }
    }
}
