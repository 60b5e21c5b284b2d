use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::triggers::{dispatch_event, ingest_change};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Dispatch endpoints
        .nest(
            "/api/v1",
            Router::new()
                // Change-feed ingestion
                .route("/orders/changes", post(ingest_change))
                // Explicit event dispatch
                .route("/dispatch", post(dispatch_event)),
        )
}
