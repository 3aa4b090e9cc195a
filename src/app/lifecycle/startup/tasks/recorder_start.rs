use crate::app::lifecycle::context::StartupContext;
use crate::core::events::recorder::EventRecorder;
use crate::core::events::sinks::{AnalyticsSink, LogSink, SinkMultiplexer};
use crate::core::pipeline::AsyncTask;
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct RecorderStartTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for RecorderStartTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing while starting recorder"),
        };

        let sinks: Vec<Arc<dyn AnalyticsSink>> = vec![Arc::new(LogSink)];

        let mux = SinkMultiplexer::new(sinks, config.recorder.per_sink_timeout);
        let recorder = EventRecorder::new(config.recorder.buffer_capacity, mux);

        let flusher = recorder.spawn_flusher(config.recorder.flush_interval);
        *context.flusher.lock() = Some(flusher);

        info!(
            "Event recorder started (buffer {}, flush every {:?})",
            config.recorder.buffer_capacity, config.recorder.flush_interval
        );

        context
            .recorder
            .set(recorder)
            .map_err(|_| anyhow!("Recorder already set"))?;

        Ok(())
    }
}
