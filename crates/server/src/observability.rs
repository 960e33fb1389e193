use std::time::Instant;

use axum::http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "crud_requests_total",
        "CRUD requests handled, by entity, verb and outcome",
        &["entity", "verb", "outcome"]
    )
    .expect("register crud_requests_total")
});

pub static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "crud_request_duration_seconds",
        "CRUD request duration in seconds",
        &["entity", "verb"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("register crud_request_duration_seconds")
});

pub fn observe(entity: &str, verb: &str, ok: bool, started: Instant) {
    let outcome = if ok { "ok" } else { "error" };
    REQUESTS_TOTAL.with_label_values(&[entity, verb, outcome]).inc();
    REQUEST_DURATION
        .with_label_values(&[entity, verb])
        .observe(started.elapsed().as_secs_f64());
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8(buffer).unwrap_or_default())
}

pub async fn metrics() -> (StatusCode, String) {
    encode_metrics()
}
