use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::economics;
use crate::core::pipeline::BlockingTask;
use anyhow::bail;
use tracing::debug;

/// Raises every impression floor to its effective value (imp vs
/// publisher vs exchange minimum) and marks it up by the bid
/// multiplier, so the floor bidders see already carries our margin.
/// PMP deal floors get the same treatment and never undercut the imp.
pub struct FloorsMarkupTask {
    multiplier: f64,
    min_floor: f64,
}

impl FloorsMarkupTask {
    pub fn new(multiplier: f64, min_floor: f64) -> Self {
        Self {
            multiplier,
            min_floor,
        }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for FloorsMarkupTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let _span = child_span_info!("floors_markup_task").entered();

        let publisher_floor = match context.publisher.get() {
            Some(publisher) => publisher.floor,
            None => bail!("No publisher on ctx, cant markup floors!"),
        };

        let mut req = context.req.write();

        for imp in req.imp.iter_mut() {
            let effective =
                economics::effective_floor(imp.bidfloor, publisher_floor, self.min_floor);
            let exposed = economics::markup_floor(effective, self.multiplier);

            if exposed != imp.bidfloor {
                debug!(
                    "Imp {} floor ${} -> ${} (effective ${})",
                    imp.id, imp.bidfloor, exposed, effective
                );
            }

            imp.bidfloor = exposed;
            if imp.bidfloorcur.is_empty() {
                imp.bidfloorcur = "USD".to_string();
            }

            let pmp = match &mut imp.pmp {
                Some(pmp) => pmp,
                None => continue,
            };

            for deal in pmp.deals.iter_mut() {
                let deal_exposed = economics::markup_floor(deal.bidfloor, self.multiplier);
                deal.bidfloor = deal_exposed.max(exposed);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::publisher::Publisher;
    use crate::core::ortb::{BidRequestBuilder, Deal, ImpBuilder, Pmp};
    use std::sync::Arc;

    fn run_floors(imp_floor: f64, pub_floor: f64, multiplier: f64) -> f64 {
        let req = BidRequestBuilder::default()
            .id("r1".to_string())
            .imp(vec![
                ImpBuilder::default()
                    .id("1".to_string())
                    .bidfloor(imp_floor)
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap();

        let ctx = AuctionContext::new("test".to_string(), "pub-1".to_string(), req);
        ctx.publisher
            .set(Arc::new(Publisher {
                floor: pub_floor,
                ..Default::default()
            }))
            .ok();

        FloorsMarkupTask::new(multiplier, 0.0).run(&ctx).unwrap();

        let floor = ctx.req.read().imp[0].bidfloor;
        floor
    }

    #[test]
    fn neutral_multiplier_leaves_floor_at_effective() {
        assert_eq!(run_floors(1.0, 0.5, 1.0), 1.0);
        assert_eq!(run_floors(0.5, 1.0, 1.0), 1.0, "publisher floor wins");
    }

    #[test]
    fn multiplier_marks_the_exposed_floor_up() {
        let exposed = run_floors(1.0, 0.0, 1.1);
        assert!((exposed - 1.1).abs() < 1e-9);
    }

    #[test]
    fn deal_floors_never_undercut_the_imp() {
        let req = BidRequestBuilder::default()
            .id("r1".to_string())
            .imp(vec![
                ImpBuilder::default()
                    .id("1".to_string())
                    .bidfloor(2.0)
                    .pmp(Some(Pmp {
                        deals: vec![Deal {
                            id: "d1".to_string(),
                            bidfloor: 0.5,
                            ..Default::default()
                        }],
                        ..Default::default()
                    }))
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap();

        let ctx = AuctionContext::new("test".to_string(), "pub-1".to_string(), req);
        ctx.publisher.set(Arc::new(Publisher::default())).ok();

        FloorsMarkupTask::new(1.0, 0.0).run(&ctx).unwrap();

        let req = ctx.req.read();
        assert_eq!(req.imp[0].pmp.as_ref().unwrap().deals[0].bidfloor, 2.0);
    }
}
