//! Prometheus metrics for marketplace-service.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, HistogramVec, TextEncoder, register_counter_vec, register_histogram_vec,
};

/// Checkout attempts by outcome (initiated, completed, failed, refunded,
/// conflict, gateway_error, signature_mismatch).
pub static CHECKOUTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "marketplace_checkouts_total",
        "Total checkout attempts by outcome",
        &["outcome"]
    )
    .expect("Failed to register checkouts_total")
});

/// PNR verification attempts by outcome.
pub static PNR_VERIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "marketplace_pnr_verifications_total",
        "Total PNR verification attempts by outcome",
        &["outcome"]
    )
    .expect("Failed to register pnr_verifications_total")
});

/// Webhook events received by type.
pub static WEBHOOK_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "marketplace_webhook_events_total",
        "Total gateway webhook events by type",
        &["event"]
    )
    .expect("Failed to register webhook_events_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "marketplace_db_query_duration_seconds",
        "Database query duration in seconds",
        &["query"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register db_query_duration")
});

/// Render all registered metrics in Prometheus text format.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_else(|e| format!("# Failed to encode metrics: {}\n", e))
}
