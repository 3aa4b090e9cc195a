use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::ortb::{Bid, BidResponse, BidResponseState, SeatBid};
use crate::core::pipeline::AsyncTask;
use crate::core::spec::nobidreasons;
use crate::core::validation::SETTLEMENT_CURRENCY;
use anyhow::{Error, bail};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{Instrument, debug};

pub fn sort_bids_by_price(bids: &mut [Bid]) {
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));
}

pub fn sort_seats_by_highest_bid(seats: &mut [SeatBid]) {
    seats.sort_by(|a, b| {
        let a_price = a.bid.first().map(|bid| bid.price).unwrap_or(0.0);
        let b_price = b.bid.first().map(|bid| bid.price).unwrap_or(0.0);
        b_price.total_cmp(&a_price)
    });
}

/// Turns the settled winners into the final OpenRTB response: one
/// seat per winning bidder, each bid priced at its clearing
/// (adjusted) value. No winners means a reasoned no-bid.
pub struct ComposeResponseTask;

impl ComposeResponseTask {
    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let winners = context.winners.lock().clone();

        if winners.is_empty() {
            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr: nobidreasons::NO_CAMPAIGNS_FOUND,
                    desc: Some("No bids received"),
                })
                .map_err(|_| anyhow::anyhow!("Response state already assigned"))?;

            debug!("Assigned no bid response to context");
            return Ok(());
        }

        // stable grouping by seat
        let mut seats: BTreeMap<String, Vec<Bid>> = BTreeMap::new();

        for winner in winners {
            let mut bid = winner.bid;
            bid.price = winner.settled.adjusted;

            seats.entry(winner.bidder).or_default().push(bid);
        }

        let mut seatbids: Vec<SeatBid> = seats
            .into_iter()
            .map(|(seat, mut bids)| {
                sort_bids_by_price(&mut bids);
                SeatBid {
                    bid: bids,
                    seat,
                    group: 0,
                }
            })
            .collect();

        sort_seats_by_highest_bid(&mut seatbids);

        let response = BidResponse {
            id: context.original_auction_id.clone(),
            seatbid: seatbids,
            bidid: context.auction_id.clone(),
            cur: SETTLEMENT_CURRENCY.to_string(),
            nbr: None,
            ext: None,
        };

        if context.res.set(BidResponseState::Bid(response)).is_err() {
            bail!("Built final bid response but one already assigned?!");
        }

        debug!("Assigned valid bid response to context");

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for ComposeResponseTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("compose_response_task");

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ortb::SeatBidBuilder;

    #[test]
    fn bids_sort_descending() {
        let mut bids = vec![
            Bid {
                price: 1.5,
                ..Default::default()
            },
            Bid {
                price: 3.0,
                ..Default::default()
            },
            Bid {
                price: 2.0,
                ..Default::default()
            },
        ];

        sort_bids_by_price(&mut bids);

        assert_eq!(bids[0].price, 3.0);
        assert_eq!(bids[2].price, 1.5);
    }

    #[test]
    fn seats_sort_by_their_best_bid() {
        let seat = |name: &str, price: f64| {
            SeatBidBuilder::default()
                .seat(name.to_string())
                .bid(vec![Bid {
                    price,
                    ..Default::default()
                }])
                .build()
                .unwrap()
        };

        let mut seats = vec![seat("low", 1.0), seat("high", 5.0), seat("mid", 3.0)];

        sort_seats_by_highest_bid(&mut seats);

        let order: Vec<_> = seats.iter().map(|s| s.seat.as_str()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }
}
