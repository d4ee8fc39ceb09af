//! Performance metrics collection and monitoring
//!
//! Counters and histograms are emitted through the `metrics` facade and
//! exposed in Prometheus format by the `/metrics` endpoint. With no
//! recorder installed (unit tests) every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::ServiceError;

/// Install the process-wide Prometheus recorder and return the handle the
/// HTTP endpoint renders from. Call once at startup.
pub fn install_recorder() -> Result<PrometheusHandle, ServiceError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

pub fn record_request(duration: Duration, success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!("screenshot_requests_total", 1, "outcome" => outcome);
    histogram!("screenshot_request_duration_seconds", duration.as_secs_f64());
}

pub fn record_cache_hit() {
    counter!("screenshot_cache_hits_total", 1);
}

pub fn record_cache_miss() {
    counter!("screenshot_cache_misses_total", 1);
}

pub fn record_cache_read_failure() {
    counter!("screenshot_cache_read_failures_total", 1);
}

pub fn record_cache_write_failure() {
    counter!("screenshot_cache_write_failures_total", 1);
}

pub fn record_render(duration: Duration, success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!("screenshot_renders_total", 1, "outcome" => outcome);
    histogram!("screenshot_render_duration_seconds", duration.as_secs_f64());
}

pub fn record_quality_downgrade(step: &'static str) {
    counter!("screenshot_quality_downgrades_total", 1, "step" => step);
}

pub fn record_error(kind: &'static str) {
    counter!("screenshot_errors_total", 1, "kind" => kind);
}
