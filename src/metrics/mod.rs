//! Prometheus metrics for the dispatch service.
//!
//! - Dispatch metrics (by event kind and terminal outcome)
//! - Token delivery metrics (delivered, failed by error kind)
//! - Invalid-token cleanup signals

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "opd";

lazy_static! {
    /// Dispatches by event kind and terminal outcome
    /// (delivered, partial, skipped, transport_unavailable)
    pub static ref DISPATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatches_total", METRIC_PREFIX),
        "Dispatches by event kind and terminal outcome",
        &["event_kind", "outcome"]
    ).unwrap();

    /// Tokens successfully delivered to
    pub static ref TOKENS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tokens_delivered_total", METRIC_PREFIX),
        "Tokens successfully delivered to"
    ).unwrap();

    /// Token delivery failures by error kind
    pub static ref TOKENS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tokens_failed_total", METRIC_PREFIX),
        "Token delivery failures by error kind",
        &["kind"]
    ).unwrap();

    /// Tokens flagged as permanently invalid (upstream cleanup signal)
    pub static ref INVALID_TOKENS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_invalid_tokens_total", METRIC_PREFIX),
        "Tokens flagged as permanently invalid"
    ).unwrap();
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
