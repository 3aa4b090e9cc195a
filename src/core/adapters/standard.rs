//! The standard OpenRTB adapter: plain JSON in, plain JSON out. Every
//! config-declared bidder speaks through this one; per-bidder quirks
//! (gzip bodies, single-imp endpoints) are driven off the bidder's
//! config rather than bespoke code.

use crate::core::adapters::adapter::{AdapterBids, BidderAdapter, BidderHttpRequest, TypedBid};
use crate::core::demand::encoding::{RequestEncoder, ResponseDecoder};
use crate::core::models::bidder::Bidder;
use crate::core::ortb::{BidRequest, MediaType};
use anyhow::{Error, anyhow};

pub struct StandardAdapter;

/// Splits a multi-imp request into one deep-copied request per imp,
/// for endpoints which only accept a single impression at a time
fn breakout_imps(req: &BidRequest) -> Vec<BidRequest> {
    if req.imp.len() <= 1 {
        return vec![req.clone()];
    }

    req.imp
        .iter()
        .map(|imp| {
            let mut single = req.clone();
            single.imp = vec![imp.clone()];
            single
        })
        .collect()
}

impl BidderAdapter for StandardAdapter {
    fn make_requests(
        &self,
        req: &BidRequest,
        bidder: &Bidder,
    ) -> (Vec<BidderHttpRequest>, Vec<Error>) {
        let payloads = if bidder.multi_imp {
            vec![req.clone()]
        } else {
            breakout_imps(req)
        };

        let mut requests = Vec::with_capacity(payloads.len());
        let mut errors = Vec::new();

        for payload in payloads {
            match RequestEncoder::encode(&payload, bidder.gzip) {
                Ok(encoded) => requests.push(BidderHttpRequest {
                    method: "POST",
                    url: bidder.endpoint.clone(),
                    headers: encoded.headers,
                    body: encoded.data,
                    payload,
                }),
                Err(e) => errors.push(anyhow!("Failed encoding callout: {}", e)),
            }
        }

        (requests, errors)
    }

    fn make_bids(&self, payload: &BidRequest, raw: &[u8]) -> (Option<AdapterBids>, Vec<Error>) {
        let response = match ResponseDecoder::decode(raw) {
            Ok(response) => response,
            Err(e) => return (None, vec![e]),
        };

        let mut bids = Vec::with_capacity(response.bid_count());
        let mut errors = Vec::new();

        for seat in response.seatbid {
            for bid in seat.bid {
                let media = match bid.mtype.and_then(MediaType::from_mtype) {
                    Some(media) => Some(media),
                    // response omitted mtype: infer from the single
                    // media type the referenced imp offered, if any
                    None => payload
                        .imp_by_id(&bid.impid)
                        .map(|imp| imp.media_types())
                        .and_then(|types| match types.as_slice() {
                            [only] => Some(*only),
                            _ => None,
                        }),
                };

                if media.is_none() && payload.imp_by_id(&bid.impid).is_none() {
                    errors.push(anyhow!(
                        "Bid {} references unknown imp {}",
                        bid.id,
                        bid.impid
                    ));
                }

                bids.push(TypedBid { bid, media });
            }
        }

        (
            Some(AdapterBids {
                response_id: response.id,
                currency: response.cur,
                bids,
            }),
            errors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ortb::{Banner, BidRequestBuilder, ImpBuilder, Video};

    fn two_imp_request() -> BidRequest {
        BidRequestBuilder::default()
            .id("r1".to_string())
            .imp(vec![
                ImpBuilder::default()
                    .id("1".to_string())
                    .banner(Some(Banner::default()))
                    .build()
                    .unwrap(),
                ImpBuilder::default()
                    .id("2".to_string())
                    .video(Some(Video::default()))
                    .build()
                    .unwrap(),
            ])
            .build()
            .unwrap()
    }

    fn test_bidder(multi_imp: bool) -> Bidder {
        Bidder {
            code: "dsp-a".to_string(),
            endpoint: "https://dsp-a.example/rtb".to_string(),
            gzip: false,
            multi_imp,
            ..Default::default()
        }
    }

    #[test]
    fn multi_imp_bidder_gets_one_callout() {
        let (reqs, errs) = StandardAdapter.make_requests(&two_imp_request(), &test_bidder(true));

        assert!(errs.is_empty());
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].payload.imp.len(), 2);
    }

    #[test]
    fn single_imp_bidder_gets_broken_out_callouts() {
        let (reqs, errs) = StandardAdapter.make_requests(&two_imp_request(), &test_bidder(false));

        assert!(errs.is_empty());
        assert_eq!(reqs.len(), 2);

        let ids: Vec<_> = reqs
            .iter()
            .map(|r| r.payload.imp[0].id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn breakout_copies_are_isolated_from_the_original() {
        let req = two_imp_request();
        let (mut reqs, _) = StandardAdapter.make_requests(&req, &test_bidder(false));

        reqs[0].payload.imp[0].bidfloor = 99.0;

        assert_eq!(req.imp[0].bidfloor, 0.0, "original request untouched");
    }

    #[test]
    fn make_bids_infers_media_from_single_type_imp() {
        let req = two_imp_request();
        let raw = br#"{
            "id": "r1",
            "seatbid": [{"bid": [
                {"id": "b1", "impid": "1", "price": 1.0, "adm": "<div/>"},
                {"id": "b2", "impid": "2", "price": 2.0, "adm": "<VAST/>"}
            ]}]
        }"#;

        let (bids, errs) = StandardAdapter.make_bids(&req, raw);
        let bids = bids.unwrap();

        assert!(errs.is_empty());
        assert_eq!(bids.bids[0].media, Some(MediaType::Banner));
        assert_eq!(bids.bids[1].media, Some(MediaType::Video));
    }

    #[test]
    fn make_bids_reports_parse_failure() {
        let (bids, errs) = StandardAdapter.make_bids(&two_imp_request(), b"<html>502</html>");

        assert!(bids.is_none());
        assert_eq!(errs.len(), 1);
    }
}
