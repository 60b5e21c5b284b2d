//! Order change events consumed by the dispatch core.
//!
//! Events are constructed from an incoming document-change envelope, validated
//! once, and discarded after a single dispatch. They are never persisted or
//! mutated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing or validating an event.
#[derive(Debug, Error)]
pub enum EventError {
    /// A field the event variant requires is absent or empty.
    #[error("invalid {kind} event: missing required field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// An update change arrived without its before-state.
    #[error("update change for document {document_id} has no before-state")]
    MissingBeforeState { document_id: String },
}

/// A notification-worthy order state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderEvent {
    /// A new order document was created.
    ///
    /// An empty `store_id` is a valid business state (the order has no store
    /// assignment yet); the resolver short-circuits it to an empty recipient
    /// set rather than treating it as a fault.
    OrderCreated {
        #[serde(rename = "orderId")]
        order_id: String,
        #[serde(rename = "storeId")]
        store_id: String,
    },

    /// An existing order's status field changed.
    OrderStatusChanged {
        #[serde(rename = "orderId")]
        order_id: String,
        #[serde(rename = "customerId")]
        customer_id: String,
        #[serde(rename = "oldStatus")]
        old_status: String,
        #[serde(rename = "newStatus")]
        new_status: String,
    },
}

impl OrderEvent {
    /// The order document this event refers to.
    pub fn order_id(&self) -> &str {
        match self {
            OrderEvent::OrderCreated { order_id, .. } => order_id,
            OrderEvent::OrderStatusChanged { order_id, .. } => order_id,
        }
    }

    /// Stable event kind label, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated { .. } => "order_created",
            OrderEvent::OrderStatusChanged { .. } => "order_status_changed",
        }
    }

    /// Reject events missing a field their variant requires.
    ///
    /// `store_id` on `OrderCreated` is deliberately not checked here; its
    /// absence is a resolver-level short-circuit, not an invalid event.
    pub fn validate(&self) -> Result<(), EventError> {
        match self {
            OrderEvent::OrderCreated { order_id, .. } => {
                if order_id.is_empty() {
                    return Err(EventError::MissingField {
                        kind: "order_created",
                        field: "orderId",
                    });
                }
            }
            OrderEvent::OrderStatusChanged {
                order_id,
                customer_id,
                ..
            } => {
                if order_id.is_empty() {
                    return Err(EventError::MissingField {
                        kind: "order_status_changed",
                        field: "orderId",
                    });
                }
                if customer_id.is_empty() {
                    return Err(EventError::MissingField {
                        kind: "order_status_changed",
                        field: "customerId",
                    });
                }
            }
        }
        Ok(())
    }
}

/// Operation kind reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Update,
}

/// Snapshot of the order document as stored upstream.
///
/// All fields are optional at the wire level; which ones are required depends
/// on the change operation and is enforced when mapping to an [`OrderEvent`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDocument {
    #[serde(rename = "storeId", default)]
    pub store_id: Option<String>,
    #[serde(rename = "customerId", default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Document-change envelope delivered by the external change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChange {
    pub operation: ChangeOperation,
    #[serde(rename = "documentId")]
    pub document_id: String,
    /// Before-state; required for updates, absent for creates.
    #[serde(default)]
    pub before: Option<OrderDocument>,
    pub after: OrderDocument,
}

impl DocumentChange {
    /// Map a raw document change to the event union.
    ///
    /// Missing optional fields degrade to empty strings so the downstream
    /// validation and short-circuit rules apply uniformly; a missing
    /// before-state on an update is rejected here because old/new status
    /// comparison is impossible without it.
    pub fn into_event(self) -> Result<OrderEvent, EventError> {
        match self.operation {
            ChangeOperation::Create => Ok(OrderEvent::OrderCreated {
                order_id: self.document_id,
                store_id: self.after.store_id.unwrap_or_default(),
            }),
            ChangeOperation::Update => {
                let before = self.before.ok_or(EventError::MissingBeforeState {
                    document_id: self.document_id.clone(),
                })?;
                Ok(OrderEvent::OrderStatusChanged {
                    order_id: self.document_id,
                    customer_id: self.after.customer_id.unwrap_or_default(),
                    old_status: before.status.unwrap_or_default(),
                    new_status: self.after.status.unwrap_or_default(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_created_requires_order_id() {
        let event = OrderEvent::OrderCreated {
            order_id: String::new(),
            store_id: "S1".to_string(),
        };
        assert!(matches!(
            event.validate(),
            Err(EventError::MissingField { field: "orderId", .. })
        ));
    }

    #[test]
    fn test_validate_created_allows_empty_store() {
        // No store assignment is a valid business state, not a malformed event
        let event = OrderEvent::OrderCreated {
            order_id: "abcd1234".to_string(),
            store_id: String::new(),
        };
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_validate_status_changed_requires_customer_id() {
        let event = OrderEvent::OrderStatusChanged {
            order_id: "O1".to_string(),
            customer_id: String::new(),
            old_status: "pending".to_string(),
            new_status: "accepted".to_string(),
        };
        assert!(matches!(
            event.validate(),
            Err(EventError::MissingField { field: "customerId", .. })
        ));
    }

    #[test]
    fn test_create_change_maps_to_created_event() {
        let change = DocumentChange {
            operation: ChangeOperation::Create,
            document_id: "abcd1234".to_string(),
            before: None,
            after: OrderDocument {
                store_id: Some("S1".to_string()),
                ..Default::default()
            },
        };

        let event = change.into_event().unwrap();
        assert_eq!(
            event,
            OrderEvent::OrderCreated {
                order_id: "abcd1234".to_string(),
                store_id: "S1".to_string(),
            }
        );
    }

    #[test]
    fn test_update_change_requires_before_state() {
        let change = DocumentChange {
            operation: ChangeOperation::Update,
            document_id: "O1".to_string(),
            before: None,
            after: OrderDocument::default(),
        };
        assert!(matches!(
            change.into_event(),
            Err(EventError::MissingBeforeState { .. })
        ));
    }

    #[test]
    fn test_update_change_maps_old_and_new_status() {
        let change = DocumentChange {
            operation: ChangeOperation::Update,
            document_id: "O1".to_string(),
            before: Some(OrderDocument {
                status: Some("pending".to_string()),
                ..Default::default()
            }),
            after: OrderDocument {
                customer_id: Some("U1".to_string()),
                status: Some("accepted".to_string()),
                ..Default::default()
            },
        };

        let event = change.into_event().unwrap();
        assert_eq!(
            event,
            OrderEvent::OrderStatusChanged {
                order_id: "O1".to_string(),
                customer_id: "U1".to_string(),
                old_status: "pending".to_string(),
                new_status: "accepted".to_string(),
            }
        );
    }

    #[test]
    fn test_change_envelope_deserializes_wire_names() {
        let json = serde_json::json!({
            "operation": "update",
            "documentId": "O9",
            "before": {"status": "pending"},
            "after": {"customerId": "U7", "status": "accepted"}
        });
        let change: DocumentChange = serde_json::from_value(json).unwrap();
        assert_eq!(change.document_id, "O9");
        assert_eq!(change.after.customer_id.as_deref(), Some("U7"));
    }
}
