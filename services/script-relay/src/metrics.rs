//! Prometheus metrics exposition
//!
//! - `relay_operations_total` (counter): labels `operation`, `outcome`
//! - `relay_operation_duration_seconds` (histogram): label `operation`
//! - `relay_authorizations_total` (counter): label `outcome`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Bucket boundaries in seconds; the top end covers the default 30s timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("relay_operation_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record one privileged operation with its outcome and wall time.
pub fn record_operation(operation: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!("relay_operations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("relay_operation_duration_seconds", "operation" => operation)
        .record(duration_secs);
}

/// Record one completed (or failed) authorization code exchange.
pub fn record_authorization(outcome: &'static str) {
    metrics::counter!("relay_authorizations_total", "outcome" => outcome).increment(1);
}
