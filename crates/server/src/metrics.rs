//! Prometheus metrics for the chat proxy

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "chat_proxy_requests_total";
pub const ERRORS_TOTAL: &str = "chat_proxy_errors_total";
pub const LATENCY_MS: &str = "chat_proxy_latency_ms";

/// Install the global Prometheus recorder
///
/// Returns `None` when a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        },
    }
}

pub fn record_request(model: &str) {
    metrics::counter!(REQUESTS_TOTAL, "model" => model.to_string()).increment(1);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_latency(ms: f64) {
    metrics::histogram!(LATENCY_MS).record(ms);
}
