use async_trait::async_trait;

/// A synchronous pipeline stage. Cheap, cpu-only work which
/// never suspends, e.g. request validation or id stamping
pub trait BlockingTask<C, E>: Send + Sync {
    fn run(&self, context: &C) -> Result<(), E>;
}

/// An asynchronous pipeline stage which may suspend on I/O,
/// e.g. outbound demand callouts or store lookups
#[async_trait]
pub trait AsyncTask<C, E>: Send + Sync {
    async fn run(&self, context: &C) -> Result<(), E>;
}

enum Stage<C, E> {
    Blocking(Box<dyn BlockingTask<C, E>>),
    Async(Box<dyn AsyncTask<C, E>>),
}

/// An ordered list of tasks sharing one context object. Tasks run
/// in registration order and the first error aborts the remainder,
/// leaving whatever result state earlier tasks attached on the context.
///
/// # Behavior
/// * Tasks receive `&C` only - shared state is interior mutability
/// on the context (OnceLock slots, locks), which keeps task wiring
/// free of lifetime plumbing
/// * An error return is flow control, not a failure to respond - the
/// caller is expected to read the response slot off the context
pub struct Pipeline<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C: Sync, E> Pipeline<C, E> {
    pub async fn run(&self, context: &C) -> Result<(), E> {
        for stage in &self.stages {
            match stage {
                Stage::Blocking(task) => task.run(context)?,
                Stage::Async(task) => task.run(context).await?,
            }
        }

        Ok(())
    }
}

pub struct PipelineBuilder<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C, E> PipelineBuilder<C, E> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_blocking(mut self, task: Box<dyn BlockingTask<C, E>>) -> Self {
        self.stages.push(Stage::Blocking(task));
        self
    }

    pub fn with_async(mut self, task: Box<dyn AsyncTask<C, E>>) -> Self {
        self.stages.push(Stage::Async(task));
        self
    }

    pub fn add_blocking(&mut self, task: Box<dyn BlockingTask<C, E>>) -> &mut Self {
        self.stages.push(Stage::Blocking(task));
        self
    }

    pub fn add_async(&mut self, task: Box<dyn AsyncTask<C, E>>) -> &mut Self {
        self.stages.push(Stage::Async(task));
        self
    }

    /// Returns None when no tasks were registered, so callers can
    /// treat an empty pipeline as "not configured"
    pub fn build(self) -> Option<Pipeline<C, E>> {
        if self.stages.is_empty() {
            return None;
        }

        Some(Pipeline {
            stages: self.stages,
        })
    }
}

impl<C, E> Default for PipelineBuilder<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Error, bail};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ctx {
        ran: AtomicUsize,
    }

    struct Incr;

    impl BlockingTask<Ctx, Error> for Incr {
        fn run(&self, context: &Ctx) -> Result<(), Error> {
            context.ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fail;

    impl BlockingTask<Ctx, Error> for Fail {
        fn run(&self, _context: &Ctx) -> Result<(), Error> {
            bail!("nope");
        }
    }

    struct AsyncIncr;

    #[async_trait]
    impl AsyncTask<Ctx, Error> for AsyncIncr {
        async fn run(&self, context: &Ctx) -> Result<(), Error> {
            context.ran.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn runs_stages_in_order() {
        let pipeline = PipelineBuilder::new()
            .with_blocking(Box::new(Incr))
            .with_async(Box::new(AsyncIncr))
            .with_blocking(Box::new(Incr))
            .build()
            .unwrap();

        let ctx = Ctx {
            ran: AtomicUsize::new(0),
        };

        pipeline.run(&ctx).await.unwrap();

        assert_eq!(ctx.ran.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn error_aborts_remaining_stages() {
        let pipeline = PipelineBuilder::new()
            .with_blocking(Box::new(Incr))
            .with_blocking(Box::new(Fail))
            .with_blocking(Box::new(Incr))
            .build()
            .unwrap();

        let ctx = Ctx {
            ran: AtomicUsize::new(0),
        };

        assert!(pipeline.run(&ctx).await.is_err());
        assert_eq!(ctx.ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_builder_returns_none() {
        let builder: PipelineBuilder<Ctx, Error> = PipelineBuilder::new();
        assert!(builder.build().is_none());
    }
}
