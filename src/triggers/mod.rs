//! Trigger layer: entry points that feed events into the dispatch core.

pub mod http;

pub use http::{dispatch_event, ingest_change, DispatchResponse};
