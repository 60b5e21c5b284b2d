// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;

// Domain layer (dispatch core)
pub mod directory;
pub mod dispatch;
pub mod event;
pub mod gateway;
pub mod payload;
pub mod resolver;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
