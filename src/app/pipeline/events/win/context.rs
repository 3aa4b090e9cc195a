use crate::core::events::model::WinEvent;
use std::sync::OnceLock;

/// Context for the win-notification pixel pipeline. The full pixel
/// url is the input; the decoded event is attached as tasks run.
#[derive(Debug, Default)]
pub struct WinEventContext {
    pub url: String,
    pub event: OnceLock<WinEvent>,
}

impl WinEventContext {
    pub fn new(url: String) -> WinEventContext {
        Self {
            url,
            ..Default::default()
        }
    }
}
