//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by method, status, upstream
//! - `gateway_request_duration_seconds` (histogram): proxied request latency
//! - `gateway_upstream_errors_total` (counter): upstream failures by kind
//! - `gateway_worker_exits_total` (counter): worker exits by name and code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram, Label};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, upstream: &str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("upstream", upstream.to_string()),
    ];
    counter!("gateway_requests_total", labels.clone()).increment(1);
    histogram!("gateway_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

/// Record a failure to reach an upstream (`connect` or `timeout`).
pub fn record_upstream_error(upstream: &str, kind: &'static str) {
    counter!(
        "gateway_upstream_errors_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record a worker exit.
pub fn record_worker_exit(name: &str, code: i32) {
    counter!(
        "gateway_worker_exits_total",
        "worker" => name.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
}
