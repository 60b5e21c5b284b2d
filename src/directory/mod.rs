//! User directory abstraction.
//!
//! The directory is the queryable store of users and their device tokens.
//! Two backends are provided:
//!
//! - `MemoryDirectory`: in-memory storage using DashMap (development, tests)
//! - `PostgresDirectory`: sqlx-backed production store
//!
//! Use `create_directory()` to pick the backend from configuration.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DirectoryConfig;

pub use memory::MemoryDirectory;
pub use postgres::PostgresDirectory;

/// Errors that can occur during directory lookups.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Backend is misconfigured or unreachable
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Role of a user record within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Store operator, notified of new orders
    Partner,
    /// Order placer, notified of status changes
    Customer,
}

/// A user as stored in the directory.
///
/// The token is optional: users without a registered device are valid records
/// and are silently excluded from recipient resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: Role,
    #[serde(rename = "storeId", default)]
    pub store_id: Option<String>,
    #[serde(rename = "fcmToken", default)]
    pub push_token: Option<String>,
}

/// Queryable user/recipient store.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find every partner assigned to the given store.
    ///
    /// Duplicate records (same token registered twice) may be returned;
    /// deduplication is the resolver's job.
    async fn find_store_partners(&self, store_id: &str) -> Result<Vec<UserRecord>, DirectoryError>;

    /// Look up a single user by identifier.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError>;
}

/// Create a directory backend based on configuration.
///
/// - `"postgres"`: connects a `PostgresDirectory` pool (requires `url`)
/// - `"memory"` (default): returns an empty `MemoryDirectory`
pub async fn create_directory(
    config: &DirectoryConfig,
) -> Result<Arc<dyn UserDirectory>, DirectoryError> {
    match config.backend.as_str() {
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                DirectoryError::Unavailable("postgres backend requires directory.url".to_string())
            })?;
            tracing::info!(backend = "postgres", "Creating Postgres user directory");
            let directory = PostgresDirectory::connect(url, config.pool_size).await?;
            Ok(Arc::new(directory))
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory user directory");
            Ok(Arc::new(MemoryDirectory::new()))
        }
    }
}
