use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use tracing::info;

/// Stops the background flusher and drains whatever the recorder
/// still buffers, so the tail of activity reaches the sinks
pub(crate) struct FlushEventsTask;

#[async_trait]
impl AsyncTask<StartupContext, anyhow::Error> for FlushEventsTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let recorder = match context.recorder.get() {
            Some(recorder) => recorder,
            None => return Ok(()),
        };

        if let Some(flusher) = context.flusher.lock().take() {
            flusher.abort();
        }

        recorder.flush().await;
        info!("Event recorder drained");

        Ok(())
    }
}
