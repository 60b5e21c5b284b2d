//! HTTP trigger handlers

use axum::{extract::State, Json};

use crate::error::Result;
use crate::event::{DocumentChange, OrderEvent};
use crate::server::AppState;

use super::models::DispatchResponse;

/// Dispatch a document change from the order store's change feed.
#[tracing::instrument(
    name = "http.ingest_change",
    skip(state, change),
    fields(operation = ?change.operation, document_id = %change.document_id)
)]
pub async fn ingest_change(
    State(state): State<AppState>,
    Json(change): Json<DocumentChange>,
) -> Result<Json<DispatchResponse>> {
    let event = change.into_event()?;
    let result = state.dispatcher.dispatch(event).await?;
    Ok(Json(result.into()))
}

/// Dispatch a pre-built event (explicit scheduler invocation).
#[tracing::instrument(
    name = "http.dispatch_event",
    skip(state, event),
    fields(event_kind = %event.kind(), order_id = %event.order_id())
)]
pub async fn dispatch_event(
    State(state): State<AppState>,
    Json(event): Json<OrderEvent>,
) -> Result<Json<DispatchResponse>> {
    let result = state.dispatcher.dispatch(event).await?;
    Ok(Json(result.into()))
}
