//! Prometheus metrics for the gateway.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `portcullis_requests_total` | Counter | `method`, `status` | Completed HTTP requests |
//! | `portcullis_request_duration_seconds` | Histogram | `method` | Request latency |
//! | `portcullis_auth_rejections_total` | Counter | `reason` | Requests rejected by authentication |
//! | `portcullis_rpc_dials_total` | Counter | `address`, `outcome` | RPC dial attempts |
//! | `portcullis_rpc_connections` | Gauge | - | Connections held by the registry |
//!
//! The recorder is process-global. Recording before [`init_metrics`] is a
//! no-op, so library code can record unconditionally.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Completed HTTP requests.
pub const REQUESTS_TOTAL: &str = "portcullis_requests_total";
/// HTTP request latency.
pub const REQUEST_DURATION_SECONDS: &str = "portcullis_request_duration_seconds";
/// Requests rejected by the authentication stage.
pub const AUTH_REJECTIONS_TOTAL: &str = "portcullis_auth_rejections_total";
/// RPC dial attempts.
pub const RPC_DIALS_TOTAL: &str = "portcullis_rpc_dials_total";
/// Live RPC connections.
pub const RPC_CONNECTIONS: &str = "portcullis_rpc_connections";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether a recorder is installed.
    pub enabled: bool,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder.
///
/// Installing twice in one process is an error from the `metrics` facade;
/// the first handle stays in place.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if no recorder was installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_counter!(
        AUTH_REJECTIONS_TOTAL,
        "Requests rejected by the authentication stage, by reason"
    );
    describe_counter!(RPC_DIALS_TOTAL, "RPC dial attempts, by address and outcome");
    describe_gauge!(RPC_CONNECTIONS, "RPC connections held by the registry");
}

/// Records a completed request.
pub fn record_request(method: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Records a request rejected by authentication.
///
/// `reason` is one of `missing_token`, `verify_failed`, `no_identity`.
pub fn record_auth_rejection(reason: &'static str) {
    counter!(AUTH_REJECTIONS_TOTAL, "reason" => reason).increment(1);
}
