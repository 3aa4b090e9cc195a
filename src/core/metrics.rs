//! Process-wide Prometheus metrics. Everything registers against the
//! default registry at first touch; `/metrics` renders the exposition
//! text (auth required - the handler lives with the server wiring).

use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter, register_int_counter_vec,
};
use std::sync::LazyLock;

pub static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "arx_requests_total",
        "All parsed auction requests by outcome",
        &["pubid", "outcome"]
    )
    .expect("metric registration")
});

pub static REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "arx_request_duration_seconds",
        "Auction request wall-clock duration",
        &["route"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
    )
    .expect("metric registration")
});

pub static BIDDER_CALLOUTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "arx_bidder_callouts_total",
        "Outbound bidder callouts by terminal status",
        &["bidder", "status"]
    )
    .expect("metric registration")
});

pub static BIDDER_LATENCY: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "arx_bidder_latency_seconds",
        "Per-bidder callout latency",
        &["bidder"],
        vec![0.01, 0.025, 0.05, 0.1, 0.2, 0.35, 0.5, 0.75, 1.0, 2.0]
    )
    .expect("metric registration")
});

pub static BREAKER_TRANSITIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "arx_breaker_transitions_total",
        "Circuit breaker state transitions",
        &["bidder", "to"]
    )
    .expect("metric registration")
});

pub static BIDS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "arx_bids_dropped_total",
        "Bids rejected by validation or floors",
        &["bidder", "reason"]
    )
    .expect("metric registration")
});

pub static EVENT_BUFFER_DROPS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "arx_event_buffer_drops_total",
        "Analytics records dropped to buffer overflow"
    )
    .expect("metric registration")
});

pub static SINK_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "arx_sink_failures_total",
        "Analytics sink delivery failures",
        &["sink"]
    )
    .expect("metric registration")
});

/// Renders the default registry in Prometheus exposition format
pub fn render() -> String {
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();

    let encoder = TextEncoder::new();
    if encoder.encode(&metric_families, &mut buf).is_err() {
        return String::new();
    }

    String::from_utf8(buf).unwrap_or_default()
}
