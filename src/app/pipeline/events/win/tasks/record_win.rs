use crate::app::pipeline::events::win::context::WinEventContext;
use crate::core::events::model::EventRecord;
use crate::core::events::recorder::EventRecorder;
use crate::core::managers::WinStats;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::sync::Arc;
use tracing::debug;

/// Buffers the win for analytics and bumps the bidder's win stats,
/// which feed cookie-sync preference
pub struct RecordWinTask {
    recorder: Arc<EventRecorder>,
    win_stats: Arc<WinStats>,
}

impl RecordWinTask {
    pub fn new(recorder: Arc<EventRecorder>, win_stats: Arc<WinStats>) -> Self {
        Self {
            recorder,
            win_stats,
        }
    }
}

impl BlockingTask<WinEventContext, Error> for RecordWinTask {
    fn run(&self, context: &WinEventContext) -> Result<(), Error> {
        let event = context
            .event
            .get()
            .ok_or_else(|| anyhow!("No win event extracted on context"))?;

        self.win_stats
            .record_win(&event.bidder, event.clearing_price);

        debug!(
            "Recorded win for {} at ${}",
            event.bidder, event.clearing_price
        );

        self.recorder.record(EventRecord::Win(event.clone()));

        Ok(())
    }
}
