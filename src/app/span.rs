use crate::core::pipeline::{AsyncTask, Pipeline};
use anyhow::Error;
use async_trait::async_trait;
use tracing::{Instrument, Span};

/// Wraps a whole pipeline as a single task running under a span
/// produced per invocation, so sub-pipelines can carry their own
/// span (or none during bootstrap, before logging exists)
pub struct WrappedPipelineTask<C> {
    pipeline: Pipeline<C, Error>,
    span_factory: fn() -> Span,
}

impl<C> WrappedPipelineTask<C> {
    pub fn new(pipeline: Pipeline<C, Error>, span_factory: fn() -> Span) -> Self {
        Self {
            pipeline,
            span_factory,
        }
    }
}

#[async_trait]
impl<C: Sync> AsyncTask<C, Error> for WrappedPipelineTask<C> {
    async fn run(&self, context: &C) -> Result<(), Error> {
        let span = (self.span_factory)();

        self.pipeline.run(context).instrument(span).await
    }
}
