//! Recipient resolution: deciding who should be notified for an event.
//!
//! Separating "who should know" from "how to tell them" keeps this logic
//! testable without any push-transport dependency.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::directory::{DirectoryError, Role, UserDirectory};
use crate::event::OrderEvent;

/// Errors raised while resolving recipients.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Directory lookup failed; retryable by the caller.
    #[error("directory lookup failed: {0}")]
    Directory(#[from] DirectoryError),
}

/// An addressable push-notification target.
///
/// Equality and ordering are defined by token identity alone: a recipient set
/// can never hold two entries with the same token, regardless of role. Tokens
/// are opaque transport identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    pub token: String,
    pub role: Role,
}

impl Recipient {
    pub fn new(token: impl Into<String>, role: Role) -> Self {
        Self {
            token: token.into(),
            role,
        }
    }
}

impl PartialEq for Recipient {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for Recipient {}

impl PartialOrd for Recipient {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Recipient {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token.cmp(&other.token)
    }
}

/// Resolves an event to the set of device tokens that should be notified.
pub struct RecipientResolver {
    directory: Arc<dyn UserDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve the recipient set for an event.
    ///
    /// An empty set is a valid outcome meaning "do not notify":
    /// - `OrderCreated` with an empty store id short-circuits without
    ///   querying the directory.
    /// - `OrderStatusChanged` with `old_status == new_status` is a no-op
    ///   transition.
    /// - Users lacking a registered token are silently excluded.
    #[tracing::instrument(
        name = "resolver.resolve",
        skip(self, event),
        fields(event_kind = %event.kind(), order_id = %event.order_id())
    )]
    pub async fn resolve(&self, event: &OrderEvent) -> Result<BTreeSet<Recipient>, ResolveError> {
        match event {
            OrderEvent::OrderCreated { store_id, .. } => {
                if store_id.is_empty() {
                    tracing::debug!("Order has no store assignment, nothing to notify");
                    return Ok(BTreeSet::new());
                }

                let partners = self.directory.find_store_partners(store_id).await?;
                let recipients: BTreeSet<Recipient> = partners
                    .into_iter()
                    .filter_map(|record| {
                        record
                            .push_token
                            .filter(|token| !token.is_empty())
                            .map(|token| Recipient::new(token, Role::Partner))
                    })
                    .collect();

                tracing::debug!(
                    store_id = %store_id,
                    recipient_count = recipients.len(),
                    "Resolved store partners"
                );
                Ok(recipients)
            }
            OrderEvent::OrderStatusChanged {
                customer_id,
                old_status,
                new_status,
                ..
            } => {
                if old_status == new_status {
                    tracing::debug!(status = %new_status, "No-op status transition, nothing to notify");
                    return Ok(BTreeSet::new());
                }

                let mut recipients = BTreeSet::new();
                if let Some(record) = self.directory.find_user(customer_id).await? {
                    if let Some(token) = record.push_token.filter(|t| !t.is_empty()) {
                        recipients.insert(Recipient::new(token, Role::Customer));
                    }
                }

                tracing::debug!(
                    customer_id = %customer_id,
                    recipient_count = recipients.len(),
                    "Resolved customer"
                );
                Ok(recipients)
            }
        }
    }
}
