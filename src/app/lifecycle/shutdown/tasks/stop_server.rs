use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use tracing::info;

pub(crate) struct StopServerTask;

#[async_trait]
impl AsyncTask<StartupContext, anyhow::Error> for StopServerTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let handle = match context.server_handle.get() {
            Some(handle) => handle,
            None => {
                info!("Skipping listener shutdown, was never started");
                return Ok(());
            }
        };

        info!("Closing listener..");
        handle.stop(true).await;

        if let Some(task) = context.server_task.lock().take() {
            let _ = task.await;
        }

        info!("Listener closed.");

        Ok(())
    }
}
