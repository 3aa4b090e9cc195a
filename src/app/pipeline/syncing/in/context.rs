use crate::app::pipeline::syncing::out::context::ConsentParams;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Context for the pipeline behind `/setuid`: a bidder is handing us
/// its UID for this user so we can host the match table entry
#[derive(Default)]
pub struct SyncInContext {
    pub bidder: String,
    pub uid: String,
    pub consent: ConsentParams,
    pub cookies: HashMap<String, String>,
    /// Resolved or minted first-party ID
    pub fpid: OnceLock<String>,
    /// Set when the handler must drop a fresh fpid cookie
    pub minted: OnceLock<()>,
    /// The UID this upsert replaced, when it was a rotation
    pub rotated: OnceLock<bool>,
}

impl SyncInContext {
    pub fn new(
        bidder: String,
        uid: String,
        consent: ConsentParams,
        cookies: HashMap<String, String>,
    ) -> SyncInContext {
        Self {
            bidder,
            uid,
            consent,
            cookies,
            ..Default::default()
        }
    }
}
