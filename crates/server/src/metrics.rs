use axum::http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

use crate::errors::Operation;

// Prometheus metrics (default registry)
pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "food_store_requests_total",
        "Record store operations served over HTTP",
        &["operation", "outcome"]
    )
    .expect("register food_store_requests_total")
});

pub fn init() {
    Lazy::force(&REQUESTS_TOTAL);
}

/// Count one finished operation; `outcome` is `ok` or an error kind.
pub fn observe(op: Operation, outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[op.as_str(), outcome]).inc();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_operations_show_up_in_the_text_format() {
        observe(Operation::Create, "conflict");
        let (status, body) = encode_metrics();
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"food_store_requests_total{operation="create",outcome="conflict"}"#));
    }
}
