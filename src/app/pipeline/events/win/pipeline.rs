use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::events::win::context::WinEventContext;
use crate::app::pipeline::events::win::tasks;
use crate::core::pipeline::{Pipeline, PipelineBuilder};
use anyhow::{Error, anyhow};

/// Builds the pipeline which handles win notification pixels,
/// regardless of where the pixel fired from (banner markup, VAST
/// impression entry)
pub fn build_win_event_pipeline(
    context: &StartupContext,
) -> Result<Pipeline<WinEventContext, Error>, Error> {
    let recorder = context
        .recorder
        .get()
        .ok_or_else(|| anyhow!("No recorder on context"))?;

    let win_stats = context
        .win_stats
        .get()
        .ok_or_else(|| anyhow!("No win stats on context"))?;

    let pipeline = PipelineBuilder::new()
        .with_blocking(Box::new(tasks::ExtractWinEventTask))
        .with_blocking(Box::new(tasks::RecordWinTask::new(
            recorder.clone(),
            win_stats.clone(),
        )))
        .build()
        .expect("Win event pipeline should have tasks");

    Ok(pipeline)
}
