//! Prometheus metrics for the key service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Lifecycle operations counter.
pub static KEY_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "key_service_operations_total",
        "Total number of key lifecycle operations",
        &["operation", "outcome"]
    )
    .expect("Failed to register operations metric")
});

/// Lifecycle operation latency histogram.
pub static OPERATION_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "key_service_operation_latency_seconds",
        "Key lifecycle operation latency in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register operation_latency metric")
});

/// Record the outcome of an operation (`ok` or an error kind label).
pub fn record_operation(operation: &str, outcome: &str) {
    KEY_OPERATIONS
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record operation latency.
pub fn record_latency(operation: &str, duration_secs: f64) {
    OPERATION_LATENCY
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Render the default registry in the Prometheus text format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_text() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
