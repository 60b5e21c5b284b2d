//! Delivery gateway abstraction over the push transport.
//!
//! The gateway accepts a token set plus a payload and reports a per-token
//! outcome, distinguishing permanently invalid tokens from transient
//! failures. Two backends are provided:
//!
//! - `HttpPushGateway`: reqwest client speaking a JSON batch-send API
//! - `MemoryGateway`: recording double with scriptable outcomes (tests, dev)
//!
//! Use `create_gateway()` to pick the backend from configuration.

mod http;
mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DeliveryConfig;
use crate::payload::NotificationPayload;

pub use http::HttpPushGateway;
pub use memory::{MemoryGateway, SentBatch};

/// Errors that fail an entire gateway call.
///
/// Per-token failures are not errors; they are reported in the
/// [`GatewayResponse`]. An `Err` from the gateway means no per-token outcome
/// is available at all.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The push transport is wholly unreachable.
    #[error("push transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The transport answered with something we cannot interpret.
    #[error("malformed gateway response: {0}")]
    InvalidResponse(String),

    /// Backend is misconfigured.
    #[error("gateway misconfigured: {0}")]
    Misconfigured(String),
}

/// Classification of a failed delivery for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    /// The transport reports the token as permanently dead; the caller
    /// should signal upstream token cleanup and never retry.
    PermanentInvalidToken,
    /// Transient transport-side failure; retryable by the caller.
    Transient,
    /// The transport as a whole was unreachable for this attempt.
    TransportUnavailable,
}

/// Outcome of one token's delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TokenOutcome {
    Delivered,
    Failed { kind: DeliveryErrorKind },
}

/// Per-token outcomes for one batch send.
#[derive(Debug, Clone, Default)]
pub struct GatewayResponse {
    pub outcomes: BTreeMap<String, TokenOutcome>,
}

impl GatewayResponse {
    pub fn delivered(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TokenOutcome::Delivered))
            .map(|(token, _)| token.as_str())
    }
}

/// External push transport.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Attempt delivery of `payload` to every token in `tokens` as a single
    /// batch. Must report an outcome for each token it actually attempted,
    /// even if the caller stops waiting.
    async fn send_batch(
        &self,
        tokens: &BTreeSet<String>,
        payload: &NotificationPayload,
    ) -> Result<GatewayResponse, GatewayError>;
}

/// Create a delivery gateway based on configuration.
///
/// - `"http"`: JSON batch client (requires `delivery.endpoint`)
/// - `"memory"` (default): recording double, delivers everything
pub fn create_gateway(config: &DeliveryConfig) -> Result<Arc<dyn DeliveryGateway>, GatewayError> {
    match config.backend.as_str() {
        "http" => {
            tracing::info!(backend = "http", "Creating HTTP push gateway");
            Ok(Arc::new(HttpPushGateway::new(config)?))
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory push gateway");
            Ok(Arc::new(MemoryGateway::new()))
        }
    }
}
