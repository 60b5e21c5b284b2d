//! HTTP trigger handlers
//!
//! The change feed (or an explicit scheduler) invokes the dispatch core over
//! HTTP:
//! - Document-change envelopes from the order store
//! - Pre-built events for direct invocation

mod handlers;
mod models;

pub use handlers::{dispatch_event, ingest_change};
pub use models::DispatchResponse;
