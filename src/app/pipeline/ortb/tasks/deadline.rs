use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::pipeline::BlockingTask;
use anyhow::anyhow;
use std::time::Duration;
use tracing::debug;

/// Floor applied to every clamped budget - below this there is no
/// time to do anything useful
const MIN_TMAX: Duration = Duration::from_millis(50);

/// Stamps the auction deadline: the request tmax (or the configured
/// default when absent) clamped into [50ms, max_tmax], anchored at
/// the instant the request arrived
pub struct DeadlineTask {
    tmax_default: Duration,
    max_tmax: Duration,
}

impl DeadlineTask {
    pub fn new(tmax_default: Duration, max_tmax: Duration) -> Self {
        Self {
            tmax_default,
            max_tmax,
        }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for DeadlineTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let _span = child_span_info!("deadline_task").entered();

        let requested = context.req.read().tmax;

        let budget = if requested == 0 {
            self.tmax_default
        } else {
            Duration::from_millis(requested)
        }
        .clamp(MIN_TMAX, self.max_tmax);

        debug!("Auction budget {:?} (requested {}ms)", budget, requested);

        context
            .tmax_ms
            .set(budget.as_millis() as u64)
            .map_err(|_| anyhow!("tmax already set on context"))?;

        context
            .deadline
            .set(context.received_at + budget)
            .map_err(|_| anyhow!("Deadline already set on context"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ortb::BidRequestBuilder;

    fn context_with_tmax(tmax: u64) -> AuctionContext {
        let req = BidRequestBuilder::default()
            .id("r1".to_string())
            .tmax(tmax)
            .build()
            .unwrap();

        AuctionContext::new("test".to_string(), "pub-1".to_string(), req)
    }

    fn task() -> DeadlineTask {
        DeadlineTask::new(Duration::from_secs(2), Duration::from_secs(5))
    }

    #[test]
    fn absent_tmax_takes_the_default() {
        let ctx = context_with_tmax(0);
        task().run(&ctx).unwrap();

        assert_eq!(*ctx.tmax_ms.get().unwrap(), 2000);
    }

    #[test]
    fn oversized_tmax_clamps_to_ceiling() {
        let ctx = context_with_tmax(60_000);
        task().run(&ctx).unwrap();

        assert_eq!(*ctx.tmax_ms.get().unwrap(), 5000);
    }

    #[test]
    fn tiny_tmax_clamps_to_floor() {
        let ctx = context_with_tmax(51);
        task().run(&ctx).unwrap();

        assert_eq!(*ctx.tmax_ms.get().unwrap(), 51);
    }
}
