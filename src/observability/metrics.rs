//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): API requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_denied_total` (counter): rejections by reason
//! - `gateway_rate_limited_total` (counter): 429s by method class
//! - `gateway_high_risk_timeouts_total` (counter): 504s from the deadline race
//! - `gateway_rate_limit_buckets` (gauge): live limiter buckets
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter is optional and owns its own listener

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_denied(reason: &'static str) {
    counter!("gateway_denied_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(class: &'static str) {
    counter!("gateway_rate_limited_total", "class" => class).increment(1);
}

pub fn record_high_risk_timeout() {
    counter!("gateway_high_risk_timeouts_total").increment(1);
}

pub fn record_bucket_count(count: usize) {
    gauge!("gateway_rate_limit_buckets").set(count as f64);
}
