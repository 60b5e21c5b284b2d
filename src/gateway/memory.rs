//! In-memory recording gateway for development and tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::payload::NotificationPayload;

use super::{DeliveryErrorKind, DeliveryGateway, GatewayError, GatewayResponse, TokenOutcome};

/// One recorded batch send.
#[derive(Debug, Clone)]
pub struct SentBatch {
    pub tokens: BTreeSet<String>,
    pub payload: NotificationPayload,
}

/// Recording double for the push transport.
///
/// Delivers every token by default; individual tokens can be scripted to
/// fail, and the whole transport can be marked unavailable.
#[derive(Default)]
pub struct MemoryGateway {
    sent: Mutex<Vec<SentBatch>>,
    scripted_failures: DashMap<String, DeliveryErrorKind>,
    unavailable: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a per-token failure for subsequent sends.
    pub fn fail_token(&self, token: impl Into<String>, kind: DeliveryErrorKind) {
        self.scripted_failures.insert(token.into(), kind);
    }

    /// Mark the whole transport unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Batches recorded so far, in send order.
    pub fn sent(&self) -> Vec<SentBatch> {
        self.sent.lock().expect("gateway record lock").clone()
    }

    /// Number of batch sends attempted.
    pub fn send_count(&self) -> usize {
        self.sent.lock().expect("gateway record lock").len()
    }
}

#[async_trait]
impl DeliveryGateway for MemoryGateway {
    async fn send_batch(
        &self,
        tokens: &BTreeSet<String>,
        payload: &NotificationPayload,
    ) -> Result<GatewayResponse, GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::TransportUnavailable(
                "memory gateway marked unavailable".to_string(),
            ));
        }

        self.sent.lock().expect("gateway record lock").push(SentBatch {
            tokens: tokens.clone(),
            payload: payload.clone(),
        });

        let mut response = GatewayResponse::default();
        for token in tokens {
            let outcome = match self.scripted_failures.get(token) {
                Some(kind) => TokenOutcome::Failed { kind: *kind },
                None => TokenOutcome::Delivered,
            };
            response.outcomes.insert(token.clone(), outcome);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::OrderEvent;
    use crate::payload;

    fn test_payload() -> NotificationPayload {
        payload::build(&OrderEvent::OrderCreated {
            order_id: "abcd1234".to_string(),
            store_id: "S1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_records_sends_and_delivers_by_default() {
        let gateway = MemoryGateway::new();
        let tokens: BTreeSet<String> = ["T1".to_string(), "T2".to_string()].into();

        let response = gateway.send_batch(&tokens, &test_payload()).await.unwrap();
        assert_eq!(response.delivered().count(), 2);
        assert_eq!(gateway.send_count(), 1);
        assert_eq!(gateway.sent()[0].tokens, tokens);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let gateway = MemoryGateway::new();
        gateway.fail_token("T1", DeliveryErrorKind::PermanentInvalidToken);
        let tokens: BTreeSet<String> = ["T1".to_string(), "T2".to_string()].into();

        let response = gateway.send_batch(&tokens, &test_payload()).await.unwrap();
        assert_eq!(
            response.outcomes["T1"],
            TokenOutcome::Failed {
                kind: DeliveryErrorKind::PermanentInvalidToken
            }
        );
        assert_eq!(response.outcomes["T2"], TokenOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_unavailable_fails_whole_call() {
        let gateway = MemoryGateway::new();
        gateway.set_unavailable(true);
        let tokens: BTreeSet<String> = ["T1".to_string()].into();

        let result = gateway.send_batch(&tokens, &test_payload()).await;
        assert!(matches!(result, Err(GatewayError::TransportUnavailable(_))));
        // An unreachable transport sends nothing, so nothing is recorded
        assert_eq!(gateway.send_count(), 0);
    }
}
