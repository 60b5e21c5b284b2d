//! Notification payload construction.
//!
//! Building a payload is a pure, total function over valid events: it never
//! inspects external state and has no failure modes (malformed events are
//! rejected by the dispatch core before this point).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::OrderEvent;

/// Number of order-id characters shown in the new-order body.
///
/// A deliberate truncation for display compactness; the prefix is not
/// globally unique and nothing may rely on it being so.
const SHORT_ORDER_ID_LEN: usize = 4;

/// A push notification ready for delivery. Immutable once built.
///
/// `data` is a `BTreeMap` so identical events always serialize to identical
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

/// Build the notification payload for an event.
pub fn build(event: &OrderEvent) -> NotificationPayload {
    match event {
        OrderEvent::OrderCreated { order_id, .. } => {
            let short_id: String = order_id.chars().take(SHORT_ORDER_ID_LEN).collect();
            NotificationPayload {
                title: "New Order Received".to_string(),
                body: format!("Order #{short_id} is waiting for a quote."),
                data: BTreeMap::from([
                    ("orderId".to_string(), order_id.clone()),
                    ("type".to_string(), "new_order".to_string()),
                ]),
            }
        }
        OrderEvent::OrderStatusChanged {
            order_id,
            new_status,
            ..
        } => NotificationPayload {
            title: "Order Update".to_string(),
            body: format!("Your order is now: {new_status}"),
            data: BTreeMap::from([
                ("orderId".to_string(), order_id.clone()),
                ("type".to_string(), "order_update".to_string()),
            ]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(order_id: &str) -> OrderEvent {
        OrderEvent::OrderCreated {
            order_id: order_id.to_string(),
            store_id: "S1".to_string(),
        }
    }

    #[test]
    fn test_new_order_payload() {
        let payload = build(&created("abcd1234"));
        assert_eq!(payload.title, "New Order Received");
        assert_eq!(payload.body, "Order #abcd is waiting for a quote.");
        assert_eq!(payload.data["orderId"], "abcd1234");
        assert_eq!(payload.data["type"], "new_order");
    }

    #[test]
    fn test_short_order_id_handles_short_input() {
        let payload = build(&created("ab"));
        assert_eq!(payload.body, "Order #ab is waiting for a quote.");
    }

    #[test]
    fn test_status_update_payload() {
        let event = OrderEvent::OrderStatusChanged {
            order_id: "O1".to_string(),
            customer_id: "U1".to_string(),
            old_status: "pending".to_string(),
            new_status: "accepted".to_string(),
        };
        let payload = build(&event);
        assert_eq!(payload.title, "Order Update");
        assert_eq!(payload.body, "Your order is now: accepted");
        assert_eq!(payload.data["orderId"], "O1");
        assert_eq!(payload.data["type"], "order_update");
    }

    #[test]
    fn test_build_is_deterministic() {
        let event = created("abcd1234");
        let first = serde_json::to_vec(&build(&event)).unwrap();
        let second = serde_json::to_vec(&build(&event)).unwrap();
        assert_eq!(first, second);
    }
}
