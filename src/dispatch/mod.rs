//! Dispatch core: one end-to-end attempt to resolve recipients, build a
//! payload, and deliver it for a single event.
//!
//! Each dispatch is independent and holds no state across invocations; the
//! surrounding event source may redeliver the same event at any time, and
//! deduplication (if required) belongs to an external layer keyed on event
//! identity. Partial delivery failure is a normal terminal state, not an
//! error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::event::{EventError, OrderEvent};
use crate::gateway::{DeliveryErrorKind, DeliveryGateway, GatewayError, TokenOutcome};
use crate::metrics::{
    DISPATCHES_TOTAL, INVALID_TOKENS_TOTAL, TOKENS_DELIVERED_TOTAL, TOKENS_FAILED_TOTAL,
};
use crate::payload;
use crate::resolver::{RecipientResolver, ResolveError};

/// Errors that abort a dispatch before any delivery outcome exists.
///
/// A transport outage is deliberately not here: it surfaces as a
/// [`DispatchResult`] with every token failed, because the caller still needs
/// the token subset for its retry decision.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event is missing a field its variant requires. Fatal for this
    /// dispatch; the core never retries it.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] EventError),

    /// Recipient lookup failed. Retryable by the caller.
    #[error("recipient resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// The gateway answered in a way that yields no per-token outcome.
    #[error("gateway failure: {0}")]
    Gateway(GatewayError),
}

/// Terminal outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Every attempted token was delivered.
    Delivered,
    /// Some tokens delivered, some failed.
    Partial,
    /// Nothing to notify (empty recipient set); the gateway was never called.
    Skipped,
    /// The transport was wholly unreachable; every token failed.
    TransportUnavailable,
}

impl DispatchOutcome {
    fn label(self) -> &'static str {
        match self {
            DispatchOutcome::Delivered => "delivered",
            DispatchOutcome::Partial => "partial",
            DispatchOutcome::Skipped => "skipped",
            DispatchOutcome::TransportUnavailable => "transport_unavailable",
        }
    }
}

/// Outcome report for one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    /// Correlation id for this dispatch attempt.
    pub dispatch_id: Uuid,
    /// Event kind label.
    pub event_kind: String,
    /// Order the event referred to.
    pub order_id: String,
    /// Number of tokens delivery was attempted for.
    pub attempted: usize,
    /// Tokens the transport confirmed delivery to.
    pub succeeded: BTreeSet<String>,
    /// Per-token failures.
    pub failed: BTreeMap<String, DeliveryErrorKind>,
    /// Tokens the transport reported permanently invalid. A cleanup signal
    /// for the upstream directory; never retried here.
    pub invalid_tokens: BTreeSet<String>,
}

impl DispatchResult {
    fn skipped(dispatch_id: Uuid, event: &OrderEvent) -> Self {
        Self {
            dispatch_id,
            event_kind: event.kind().to_string(),
            order_id: event.order_id().to_string(),
            attempted: 0,
            succeeded: BTreeSet::new(),
            failed: BTreeMap::new(),
            invalid_tokens: BTreeSet::new(),
        }
    }

    /// Terminal outcome classification.
    pub fn outcome(&self) -> DispatchOutcome {
        if self.attempted == 0 {
            DispatchOutcome::Skipped
        } else if self.failed.is_empty() {
            DispatchOutcome::Delivered
        } else if self.succeeded.is_empty()
            && self
                .failed
                .values()
                .all(|k| *k == DeliveryErrorKind::TransportUnavailable)
        {
            DispatchOutcome::TransportUnavailable
        } else {
            DispatchOutcome::Partial
        }
    }
}

/// Running counters for the dispatcher.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub dispatches: AtomicU64,
    pub skipped: AtomicU64,
    pub tokens_delivered: AtomicU64,
    pub tokens_failed: AtomicU64,
    pub invalid_tokens: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            tokens_delivered: self.tokens_delivered.load(Ordering::Relaxed),
            tokens_failed: self.tokens_failed.load(Ordering::Relaxed),
            invalid_tokens: self.invalid_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub dispatches: u64,
    pub skipped: u64,
    pub tokens_delivered: u64,
    pub tokens_failed: u64,
    pub invalid_tokens: u64,
}

/// Orchestrates validate, resolve, build, deliver, classify.
///
/// The resolver and gateway are injected so both can be substituted with
/// test doubles.
pub struct Dispatcher {
    resolver: RecipientResolver,
    gateway: Arc<dyn DeliveryGateway>,
    stats: DispatcherStats,
}

impl Dispatcher {
    pub fn new(resolver: RecipientResolver, gateway: Arc<dyn DeliveryGateway>) -> Self {
        Self {
            resolver,
            gateway,
            stats: DispatcherStats::default(),
        }
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one dispatch for an event.
    ///
    /// An empty recipient set terminates with `attempted: 0` without touching
    /// the gateway. A total transport outage terminates with every token
    /// failed as `TransportUnavailable`; the caller owns any retry.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, event),
        fields(event_kind = %event.kind(), order_id = %event.order_id())
    )]
    pub async fn dispatch(&self, event: OrderEvent) -> Result<DispatchResult, DispatchError> {
        let dispatch_id = Uuid::new_v4();

        event.validate()?;

        let recipients = self.resolver.resolve(&event).await?;
        if recipients.is_empty() {
            let result = DispatchResult::skipped(dispatch_id, &event);
            self.record(&result);
            tracing::debug!(dispatch_id = %dispatch_id, "Nothing to notify");
            return Ok(result);
        }

        let payload = payload::build(&event);
        let tokens: BTreeSet<String> = recipients.into_iter().map(|r| r.token).collect();
        let attempted = tokens.len();

        let mut succeeded = BTreeSet::new();
        let mut failed = BTreeMap::new();

        match self.gateway.send_batch(&tokens, &payload).await {
            Ok(response) => {
                for token in &tokens {
                    // The gateway contract requires an outcome per attempted
                    // token; an unreported token counts as a transient failure
                    match response.outcomes.get(token) {
                        Some(TokenOutcome::Delivered) => {
                            succeeded.insert(token.clone());
                        }
                        Some(TokenOutcome::Failed { kind }) => {
                            failed.insert(token.clone(), *kind);
                        }
                        None => {
                            failed.insert(token.clone(), DeliveryErrorKind::Transient);
                        }
                    }
                }
            }
            Err(GatewayError::TransportUnavailable(reason)) => {
                tracing::warn!(
                    dispatch_id = %dispatch_id,
                    token_count = attempted,
                    reason = %reason,
                    "Push transport unavailable, all tokens failed"
                );
                for token in &tokens {
                    failed.insert(token.clone(), DeliveryErrorKind::TransportUnavailable);
                }
            }
            Err(e) => return Err(DispatchError::Gateway(e)),
        }

        let invalid_tokens: BTreeSet<String> = failed
            .iter()
            .filter(|(_, kind)| **kind == DeliveryErrorKind::PermanentInvalidToken)
            .map(|(token, _)| token.clone())
            .collect();

        if !invalid_tokens.is_empty() {
            tracing::warn!(
                dispatch_id = %dispatch_id,
                tokens = ?invalid_tokens,
                "Tokens reported permanently invalid, flagged for upstream cleanup"
            );
        }

        let result = DispatchResult {
            dispatch_id,
            event_kind: event.kind().to_string(),
            order_id: event.order_id().to_string(),
            attempted,
            succeeded,
            failed,
            invalid_tokens,
        };
        self.record(&result);

        tracing::debug!(
            dispatch_id = %dispatch_id,
            attempted = result.attempted,
            delivered = result.succeeded.len(),
            failed = result.failed.len(),
            outcome = result.outcome().label(),
            "Dispatch complete"
        );

        Ok(result)
    }

    fn record(&self, result: &DispatchResult) {
        self.stats.dispatches.fetch_add(1, Ordering::Relaxed);
        if result.attempted == 0 {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
        }
        self.stats
            .tokens_delivered
            .fetch_add(result.succeeded.len() as u64, Ordering::Relaxed);
        self.stats
            .tokens_failed
            .fetch_add(result.failed.len() as u64, Ordering::Relaxed);
        self.stats
            .invalid_tokens
            .fetch_add(result.invalid_tokens.len() as u64, Ordering::Relaxed);

        DISPATCHES_TOTAL
            .with_label_values(&[&result.event_kind, result.outcome().label()])
            .inc();
        TOKENS_DELIVERED_TOTAL.inc_by(result.succeeded.len() as u64);
        for kind in result.failed.values() {
            let label = match kind {
                DeliveryErrorKind::PermanentInvalidToken => "permanent_invalid_token",
                DeliveryErrorKind::Transient => "transient",
                DeliveryErrorKind::TransportUnavailable => "transport_unavailable",
            };
            TOKENS_FAILED_TOTAL.with_label_values(&[label]).inc();
        }
        INVALID_TOKENS_TOTAL.inc_by(result.invalid_tokens.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{MemoryDirectory, Role, UserRecord};
    use crate::gateway::MemoryGateway;

    fn partner(user_id: &str, store_id: &str, token: &str) -> UserRecord {
        UserRecord {
            user_id: user_id.to_string(),
            role: Role::Partner,
            store_id: Some(store_id.to_string()),
            push_token: Some(token.to_string()),
        }
    }

    fn setup(records: Vec<UserRecord>) -> (Dispatcher, Arc<MemoryGateway>) {
        let directory = MemoryDirectory::new();
        for record in records {
            directory.insert(record);
        }
        let gateway = Arc::new(MemoryGateway::new());
        let dispatcher = Dispatcher::new(
            RecipientResolver::new(Arc::new(directory)),
            gateway.clone(),
        );
        (dispatcher, gateway)
    }

    fn created(order_id: &str, store_id: &str) -> OrderEvent {
        OrderEvent::OrderCreated {
            order_id: order_id.to_string(),
            store_id: store_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_event_rejected_before_delivery() {
        let (dispatcher, gateway) = setup(vec![]);
        let result = dispatcher.dispatch(created("", "S1")).await;
        assert!(matches!(result, Err(DispatchError::InvalidEvent(_))));
        assert_eq!(gateway.send_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_skips_gateway() {
        let (dispatcher, gateway) = setup(vec![partner("p1", "S1", "T1")]);
        let result = dispatcher.dispatch(created("x", "")).await.unwrap();
        assert_eq!(result.attempted, 0);
        assert_eq!(result.outcome(), DispatchOutcome::Skipped);
        assert_eq!(gateway.send_count(), 0);
    }

    #[tokio::test]
    async fn test_full_delivery() {
        let (dispatcher, gateway) = setup(vec![
            partner("p1", "S1", "T1"),
            partner("p2", "S1", "T2"),
        ]);

        let result = dispatcher.dispatch(created("abcd1234", "S1")).await.unwrap();
        assert_eq!(result.attempted, 2);
        assert_eq!(result.outcome(), DispatchOutcome::Delivered);
        assert!(result.succeeded.contains("T1") && result.succeeded.contains("T2"));

        let batch = &gateway.sent()[0];
        assert!(batch.payload.body.contains("abcd"));
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_fatal() {
        let (dispatcher, gateway) = setup(vec![
            partner("p1", "S1", "T1"),
            partner("p2", "S1", "T2"),
        ]);
        gateway.fail_token("T1", DeliveryErrorKind::PermanentInvalidToken);

        let result = dispatcher.dispatch(created("abcd1234", "S1")).await.unwrap();
        assert_eq!(result.outcome(), DispatchOutcome::Partial);
        assert_eq!(result.succeeded, BTreeSet::from(["T2".to_string()]));
        assert_eq!(
            result.failed["T1"],
            DeliveryErrorKind::PermanentInvalidToken
        );
        assert_eq!(result.invalid_tokens, BTreeSet::from(["T1".to_string()]));
    }

    #[tokio::test]
    async fn test_transport_outage_fails_all_tokens() {
        let (dispatcher, gateway) = setup(vec![partner("p1", "S1", "T1")]);
        gateway.set_unavailable(true);

        let result = dispatcher.dispatch(created("abcd1234", "S1")).await.unwrap();
        assert_eq!(result.outcome(), DispatchOutcome::TransportUnavailable);
        assert_eq!(result.attempted, 1);
        assert!(result.succeeded.is_empty());
        assert_eq!(result.failed["T1"], DeliveryErrorKind::TransportUnavailable);
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let (dispatcher, _gateway) = setup(vec![partner("p1", "S1", "T1")]);

        dispatcher.dispatch(created("abcd1234", "S1")).await.unwrap();
        dispatcher.dispatch(created("x", "")).await.unwrap();

        let stats = dispatcher.stats();
        assert_eq!(stats.dispatches, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.tokens_delivered, 1);
        assert_eq!(stats.tokens_failed, 0);
    }
}
