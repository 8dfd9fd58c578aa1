//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stub_requests_total` (counter): requests by method, status and source
//!   (`stub`, `proxy`, `none`)
//! - `stub_request_duration_seconds` (histogram): latency distribution
//! - `stub_upstream_failures_total` (counter): failed upstream exchanges
//! - `stub_captures_total` (counter): capture writes by outcome (`saved`, `failed`)
//!
//! Recording is a no-op until a recorder is installed, so the helpers are
//! safe to call from tests and from processes with metrics disabled.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr` and install the recorder.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_counter!("stub_requests_total", "Total number of inbound requests served");
    describe_histogram!(
        "stub_request_duration_seconds",
        "Inbound request duration in seconds"
    );
    describe_counter!(
        "stub_upstream_failures_total",
        "Upstream exchanges that failed before a response arrived"
    );
    describe_counter!("stub_captures_total", "Capture writes by outcome");

    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record one served request.
pub fn record_request(method: &str, status: u16, source: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("source", source.to_string()),
    ];
    counter!("stub_requests_total", &labels).increment(1);
    histogram!("stub_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_failure() {
    counter!("stub_upstream_failures_total").increment(1);
}

pub fn record_capture(outcome: &'static str) {
    counter!("stub_captures_total", "outcome" => outcome).increment(1);
}
