//! Wire models for the HTTP trigger surface.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dispatch::{DispatchOutcome, DispatchResult};
use crate::gateway::DeliveryErrorKind;

/// Outcome report returned to the trigger caller.
///
/// Carries the full per-token breakdown so the caller can make its own retry
/// decision; the core never retries.
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub dispatch_id: Uuid,
    pub event_kind: String,
    pub order_id: String,
    pub outcome: DispatchOutcome,
    pub attempted: usize,
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeMap<String, DeliveryErrorKind>,
    pub invalid_tokens: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<DispatchResult> for DispatchResponse {
    fn from(result: DispatchResult) -> Self {
        let outcome = result.outcome();
        Self {
            dispatch_id: result.dispatch_id,
            event_kind: result.event_kind,
            order_id: result.order_id,
            outcome,
            attempted: result.attempted,
            succeeded: result.succeeded,
            failed: result.failed,
            invalid_tokens: result.invalid_tokens,
            timestamp: Utc::now(),
        }
    }
}
