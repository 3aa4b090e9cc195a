use super::response::BidResponse;
use actix_web::body::BoxBody;
use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, Responder};
use serde_json::json;
use tracing::warn;

/// Final outcome of processing one auction, attached to the auction
/// context by whichever task settles it first
#[derive(Debug)]
pub enum BidResponseState {
    /// A valid response carrying one or more seat bids
    Bid(BidResponse),
    /// Plain no-bid, rendered as an empty 204
    NoBid { desc: Option<&'static str> },
    /// No-bid with an explicit reason code, rendered as a 200
    /// with the `nbr` field set
    NoBidReason {
        reqid: String,
        nbr: u32,
        desc: Option<&'static str>,
    },
}

impl Responder for BidResponseState {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        match self {
            BidResponseState::Bid(res) => match serde_json::to_string(&res) {
                Ok(body) => HttpResponse::Ok()
                    .content_type(ContentType::json())
                    .body(body),
                Err(e) => {
                    warn!("Failed encoding final bid response: {}", e);
                    HttpResponse::InternalServerError()
                        .content_type(ContentType::json())
                        .body(json!({"error": "encoding failure"}).to_string())
                }
            },
            BidResponseState::NoBid { .. } => HttpResponse::NoContent().finish(),
            BidResponseState::NoBidReason { reqid, nbr, .. } => HttpResponse::Ok()
                .content_type(ContentType::json())
                .body(json!({"id": reqid, "nbr": nbr}).to_string()),
        }
    }
}
