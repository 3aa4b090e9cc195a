use crate::core::adapters::adapter::BidderHttpRequest;
use crate::core::demand::client::{CalloutError, CalloutResult, Dispatch};
use crate::core::ortb::BidRequest;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Scripted behavior for one bidder endpoint
#[derive(Clone)]
pub enum Script {
    /// Answer a well-formed single bid after the delay
    Bid { price: f64, delay: Duration },
    /// Answer 204 after the delay
    NoBid { delay: Duration },
    /// Return exactly this result after its recorded latency
    Fixed(CalloutResult),
}

impl Script {
    pub fn bid(price: f64, delay: Duration) -> Script {
        Script::Bid { price, delay }
    }

    pub fn no_bid(delay: Duration) -> Script {
        Script::NoBid { delay }
    }
}

/// Bidder code embedded in fixture endpoint urls:
/// `https://<code>.example/rtb`
fn code_from_url(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('.')
        .next()
        .unwrap_or("unknown")
        .to_string()
}

fn bid_body(payload: &BidRequest, price: f64) -> Bytes {
    let impid = payload
        .imp
        .first()
        .map(|imp| imp.id.clone())
        .unwrap_or_else(|| "1".to_string());

    let body = json!({
        "id": payload.id,
        "cur": "USD",
        "seatbid": [{
            "bid": [{
                "id": format!("bid-{}", impid),
                "impid": impid,
                "price": price,
                "adm": "<div>ad</div>",
                "crid": "cr-1",
                "adomain": ["adv.example"],
                "w": 300,
                "h": 250
            }]
        }]
    });

    Bytes::from(serde_json::to_vec(&body).expect("fixture body encodes"))
}

fn timeout_result(budget: Duration, bytes_out: usize) -> CalloutResult {
    CalloutResult {
        status: 0,
        body: Bytes::new(),
        latency: budget,
        bytes_out,
        error: Some(CalloutError::Timeout),
    }
}

/// In-process dispatcher driven by per-bidder scripts. Respects the
/// budget the way the real dispatcher does: a delay past the budget
/// sleeps the budget out and reports a timeout.
pub struct FakeDispatch {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDispatch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, code: &str, script: Script) {
        self.scripts.lock().insert(code.to_string(), script);
    }

    /// Bidder codes called, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Dispatch for FakeDispatch {
    async fn send(&self, req: &BidderHttpRequest, budget: Duration) -> CalloutResult {
        let code = code_from_url(&req.url);
        self.calls.lock().push(code.clone());

        let script = self.scripts.lock().get(&code).cloned();
        let bytes_out = req.body.len();

        match script {
            None => CalloutResult {
                status: 0,
                body: Bytes::new(),
                latency: Duration::ZERO,
                bytes_out,
                error: Some(CalloutError::Connection("no script for endpoint".to_string())),
            },
            Some(Script::Bid { price, delay }) => {
                if delay >= budget {
                    tokio::time::sleep(budget).await;
                    return timeout_result(budget, bytes_out);
                }

                tokio::time::sleep(delay).await;

                CalloutResult {
                    status: 200,
                    body: bid_body(&req.payload, price),
                    latency: delay,
                    bytes_out,
                    error: None,
                }
            }
            Some(Script::NoBid { delay }) => {
                if delay >= budget {
                    tokio::time::sleep(budget).await;
                    return timeout_result(budget, bytes_out);
                }

                tokio::time::sleep(delay).await;

                CalloutResult {
                    status: 204,
                    body: Bytes::new(),
                    latency: delay,
                    bytes_out,
                    error: None,
                }
            }
            Some(Script::Fixed(result)) => {
                tokio::time::sleep(result.latency.min(budget)).await;
                result
            }
        }
    }
}
