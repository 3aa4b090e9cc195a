use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::startup::tasks;
use crate::app::span::WrappedPipelineTask;
use crate::core::pipeline::{Pipeline, PipelineBuilder};
use std::path::PathBuf;
use tracing::{Span, info_span};

/// Builds the graceful ordering of startup tasks. Config and logging
/// come up first (the bootloader), then services in dependency order,
/// pipelines, and finally the listener.
pub fn build_start_pipeline(cfg_path: PathBuf) -> Pipeline<StartupContext, anyhow::Error> {
    let boot_loader = PipelineBuilder::new()
        .with_blocking(Box::new(tasks::ConfigLoadTask::new(cfg_path)))
        .with_blocking(Box::new(tasks::ConfigureObservabilityTask))
        .build()
        .expect("Bootloader should have tasks!");

    // logging exists from here on, so these tasks may span/log freely
    let start_pipeline = PipelineBuilder::new()
        .with_blocking(Box::new(tasks::DeviceLookupLoadTask))
        .with_blocking(Box::new(tasks::GeoLookupLoadTask))
        .with_blocking(Box::new(tasks::AdaptersLoadTask))
        .with_blocking(Box::new(tasks::PubsLoadTask))
        .with_blocking(Box::new(tasks::ServicesInitTask))
        .with_async(Box::new(tasks::SyncStoreInitTask))
        .with_async(Box::new(tasks::RecorderStartTask))
        .with_blocking(Box::new(tasks::BuildRtbPipelineTask))
        .with_blocking(Box::new(tasks::BuildSyncPipelinesTask))
        .with_blocking(Box::new(tasks::BuildWinEventPipelineTask))
        .with_async(Box::new(tasks::StartServerTask))
        .build()
        .expect("Startup pipeline should have tasks!");

    // bootloader runs unobserved - a span there would be dropped by
    // the subscriber it is about to install
    let nop_bootloader_pipeline = WrappedPipelineTask::new(boot_loader, Span::none);

    let observed_startup_pipeline =
        WrappedPipelineTask::new(start_pipeline, || info_span!("start_pipeline"));

    PipelineBuilder::new()
        .with_async(Box::new(nop_bootloader_pipeline))
        .with_async(Box::new(observed_startup_pipeline))
        .build()
        .expect("Pipeline should have tasks!")
}
