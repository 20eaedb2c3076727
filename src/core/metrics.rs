// src/core/metrics.rs

//! Defines and registers Prometheus metrics for daemon monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{CounterVec, TextEncoder, register_counter_vec};

lazy_static! {
    /// Requests handled by the router, labeled by serving mode and status.
    pub static ref REQUEST_TOTAL: CounterVec = register_counter_vec!(
        "modproxy_router_request_total",
        "Total requests handled by the router.",
        &["mode", "status"]
    )
    .unwrap();
}

/// Records one completed request.
pub fn observe_request(mode: &str, status: u16) {
    REQUEST_TOTAL
        .with_label_values(&[mode, &status.to_string()])
        .inc();
}

/// Gathers all registered metrics and encodes them in the Prometheus text
/// format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
