use crate::core::adapters::adapter::BidderHttpRequest;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, redirect};
use std::time::{Duration, Instant};
use strum::Display;
use tracing::{debug, trace};

/// Classified transport-level failure for one callout
#[derive(Debug, Clone, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CalloutError {
    /// Budget elapsed before the response completed
    Timeout,
    /// Could not connect or the connection dropped mid-flight
    Connection(String),
    /// Response body exceeded the configured cap
    BodyTooLarge,
    /// Upstream answered with a non-2xx status
    Status(u16),
}

/// Wire-level outcome of one callout. `body` is the decompressed
/// payload when the upstream answered 200 with content.
#[derive(Debug, Clone)]
pub struct CalloutResult {
    pub status: u16,
    pub body: Bytes,
    pub latency: Duration,
    pub bytes_out: usize,
    pub error: Option<CalloutError>,
}

impl CalloutResult {
    /// A 204, or a 200 with nothing in it, is a polite no-bid
    pub fn is_no_bid(&self) -> bool {
        self.error.is_none() && (self.status == 204 || self.body.is_empty())
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The seam between the orchestrator and the network. Production uses
/// ['HttpDispatcher']; tests swap in scripted fakes.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn send(&self, req: &BidderHttpRequest, budget: Duration) -> CalloutResult;
}

/// Executes one adapter callout over a shared connection pool with the
/// auction's remaining budget as a hard timeout.
pub struct HttpDispatcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpDispatcher {
    pub fn new(max_body_bytes: usize, pool_per_host: usize) -> Result<Self, Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent("arx-exchange")
            .connect_timeout(Duration::from_secs(1))
            .pool_max_idle_per_host(pool_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .tcp_keepalive(Some(Duration::from_secs(20)))
            .tcp_nodelay(true)
            .referer(false)
            .redirect(redirect::Policy::none())
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(Error::from)?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }

    async fn send_once(
        &self,
        req: &BidderHttpRequest,
        budget: Duration,
    ) -> Result<(u16, Bytes), CalloutError> {
        let mut headers = HeaderMap::new();
        for header in &req.headers {
            let key = HeaderName::from_static(header.key);
            if let Ok(value) = HeaderValue::from_str(&header.value) {
                headers.insert(key, value);
            }
        }

        let request = self
            .client
            .post(&req.url)
            .headers(headers)
            .timeout(budget)
            .body(req.body.clone())
            .build()
            .map_err(|e| CalloutError::Connection(e.to_string()))?;

        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                CalloutError::Timeout
            } else {
                CalloutError::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 204 {
            return Ok((status, Bytes::new()));
        }

        if !(200..300).contains(&status) {
            debug!("Non-2xx status {}, skipping body", status);
            return Err(CalloutError::Status(status));
        }

        // stream the body in with the size cap enforced as we go, so
        // an oversized response is cut off rather than buffered whole
        let mut body = BytesMut::new();
        let mut stream = response;

        while let Some(chunk) = stream.chunk().await.map_err(|e| {
            if e.is_timeout() {
                CalloutError::Timeout
            } else {
                CalloutError::Connection(e.to_string())
            }
        })? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(CalloutError::BodyTooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        Ok((status, body.freeze()))
    }
}

/// Headroom required before a connection-reset retry is worth it
const RETRY_HEADROOM: Duration = Duration::from_millis(200);

#[async_trait]
impl Dispatch for HttpDispatcher {
    async fn send(&self, req: &BidderHttpRequest, budget: Duration) -> CalloutResult {
        let bytes_out = req.body.len();
        let started = Instant::now();

        let mut attempt = self.send_once(req, budget).await;

        // a reset before anything came back may be retried once if the
        // budget still leaves real headroom; timeouts never retry
        if let Err(CalloutError::Connection(_)) = &attempt {
            let remaining = budget.saturating_sub(started.elapsed());

            if remaining >= RETRY_HEADROOM {
                trace!("Retrying callout after connection error, {:?} left", remaining);
                attempt = self.send_once(req, remaining).await;
            }
        }

        let latency = started.elapsed();

        match attempt {
            Ok((status, body)) => CalloutResult {
                status,
                body,
                latency,
                bytes_out,
                error: None,
            },
            Err(error) => {
                let status = match &error {
                    CalloutError::Status(code) => *code,
                    _ => 0,
                };

                CalloutResult {
                    status,
                    body: Bytes::new(),
                    latency,
                    bytes_out,
                    error: Some(error),
                }
            }
        }
    }
}

/// Derives one callout's budget from the auction deadline: whatever
/// time remains minus the safety margin reserved for validation and
/// settlement. Errors when the margin already ate the budget.
pub fn callout_budget(
    deadline: Instant,
    safety_margin: Duration,
) -> Result<Duration, Error> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let budget = remaining.saturating_sub(safety_margin);

    if budget.is_zero() {
        return Err(anyhow!("No callout budget left inside the deadline"));
    }

    Ok(budget)
}
