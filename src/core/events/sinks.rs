use crate::core::events::model::EventRecord;
use crate::core::metrics;
use anyhow::Error;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// An analytics destination. Sinks are best-effort: a failure is the
/// sink's problem, never the auction's.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, batch: &[EventRecord]) -> Result<(), Error>;
}

/// Broadcasts one batch to every registered sink sequentially, each
/// under its own timeout. A sink that errors or stalls is logged and
/// skipped; the rest still receive the batch.
pub struct SinkMultiplexer {
    sinks: Vec<Arc<dyn AnalyticsSink>>,
    per_sink_timeout: Duration,
}

impl SinkMultiplexer {
    pub fn new(sinks: Vec<Arc<dyn AnalyticsSink>>, per_sink_timeout: Duration) -> Self {
        Self {
            sinks,
            per_sink_timeout,
        }
    }

    pub async fn broadcast(&self, batch: &[EventRecord]) {
        for sink in &self.sinks {
            match tokio::time::timeout(self.per_sink_timeout, sink.deliver(batch)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Analytics sink {} failed: {}", sink.name(), e);
                    metrics::SINK_FAILURES.with_label_values(&[sink.name()]).inc();
                }
                Err(_) => {
                    warn!(
                        "Analytics sink {} exceeded {:?} timeout",
                        sink.name(),
                        self.per_sink_timeout
                    );
                    metrics::SINK_FAILURES.with_label_values(&[sink.name()]).inc();
                }
            }
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

/// Writes each record as one structured log line
pub struct LogSink;

#[async_trait]
impl AnalyticsSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, batch: &[EventRecord]) -> Result<(), Error> {
        for record in batch {
            info!(target: "analytics", "{}", serde_json::to_string(record)?);
        }

        Ok(())
    }
}

/// Test-visible sink collecting everything it receives
pub struct MemorySink {
    pub records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, batch: &[EventRecord]) -> Result<(), Error> {
        self.records.lock().extend_from_slice(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::model::AuctionRecord;
    use anyhow::bail;

    struct FailingSink;

    #[async_trait]
    impl AnalyticsSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&self, _batch: &[EventRecord]) -> Result<(), Error> {
            bail!("sink is down");
        }
    }

    struct StallingSink;

    #[async_trait]
    impl AnalyticsSink for StallingSink {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn deliver(&self, _batch: &[EventRecord]) -> Result<(), Error> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn batch() -> Vec<EventRecord> {
        vec![EventRecord::Auction(AuctionRecord {
            auction_id: "a-1".to_string(),
            ..Default::default()
        })]
    }

    #[tokio::test]
    async fn faulty_sinks_do_not_starve_healthy_ones() {
        let memory = MemorySink::new();

        let mux = SinkMultiplexer::new(
            vec![
                Arc::new(FailingSink),
                Arc::new(StallingSink),
                memory.clone(),
            ],
            Duration::from_millis(50),
        );

        mux.broadcast(&batch()).await;

        assert_eq!(memory.records.lock().len(), 1);
    }
}
