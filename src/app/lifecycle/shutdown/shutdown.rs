use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::shutdown::tasks::{FlushEventsTask, StopServerTask};
use crate::core::pipeline::{Pipeline, PipelineBuilder};

/// Builds the shutdown pipeline over the resulting `StartupContext`:
/// stop taking requests first, then drain what's buffered
pub fn build_shutdown_pipeline() -> Pipeline<StartupContext, anyhow::Error> {
    PipelineBuilder::new()
        .with_async(Box::new(StopServerTask))
        .with_async(Box::new(FlushEventsTask))
        .build()
        .expect("Shutdown pipeline should have tasks!")
}
