/// Metrics and telemetry for the Spartan GCP services
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Backend calls by service, operation and outcome
/// - Operation latencies
/// - Cache hit/miss rates
/// - Mapped domain errors

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Backend calls by service, operation and outcome
    pub static ref BACKEND_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "spartan_backend_calls_total",
        "Total number of backend calls",
        &["service", "operation", "outcome"]
    )
    .unwrap();

    /// Operation duration in seconds
    pub static ref OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "spartan_operation_duration_seconds",
        "Service operation latencies in seconds",
        &["service", "operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Cache hits by cache label
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "spartan_cache_hits_total",
        "Total number of cache hits",
        &["cache"]
    )
    .unwrap();

    /// Cache misses by cache label
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "spartan_cache_misses_total",
        "Total number of cache misses",
        &["cache"]
    )
    .unwrap();

    /// Errors surfaced to callers, by service and kind
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "spartan_errors_total",
        "Total number of mapped errors",
        &["service", "kind"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a finished operation
pub fn record_operation(service: &str, operation: &str, success: bool, duration_secs: f64) {
    BACKEND_CALLS_TOTAL
        .with_label_values(&[service, operation, if success { "success" } else { "error" }])
        .inc();
    OPERATION_DURATION_SECONDS
        .with_label_values(&[service, operation])
        .observe(duration_secs);
}

/// Record a mapped error
pub fn record_error(service: &str, kind: &str) {
    ERRORS_TOTAL.with_label_values(&[service, kind]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation() {
        record_operation("secret_manager", "secret retrieval", true, 0.01);
        let metrics = render_metrics();
        assert!(metrics.contains("spartan_backend_calls_total"));
        assert!(metrics.contains("spartan_operation_duration_seconds"));
    }

    #[test]
    fn test_record_error() {
        record_error("parameter_manager", "not_found");
        let metrics = render_metrics();
        assert!(metrics.contains("spartan_errors_total"));
    }

    #[test]
    fn test_cache_counters() {
        CACHE_HITS_TOTAL.with_label_values(&["metrics_test"]).inc();
        CACHE_MISSES_TOTAL.with_label_values(&["metrics_test"]).inc();
        let metrics = render_metrics();
        assert!(metrics.contains("spartan_cache_hits_total"));
        assert!(metrics.contains("spartan_cache_misses_total"));
    }
}
