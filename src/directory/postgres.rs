//! PostgreSQL user directory backend.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use super::{DirectoryError, Role, UserDirectory, UserRecord};

const CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// User directory backed by a `users` table.
///
/// Expected schema: `users(user_id text primary key, role text,
/// store_id text null, push_token text null)` with an index on
/// `(store_id, role)` for the partner query.
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    /// Connect a new pool against the given database URL.
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, DirectoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
            .connect(url)
            .await?;

        tracing::info!(pool_size = pool_size, "PostgreSQL directory pool created");
        Ok(Self { pool })
    }

    /// Wrap an existing pool (shared with other components).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> UserRecord {
        let role: String = row.get("role");
        UserRecord {
            user_id: row.get("user_id"),
            role: if role == "partner" {
                Role::Partner
            } else {
                Role::Customer
            },
            store_id: row.get("store_id"),
            push_token: row.get("push_token"),
        }
    }
}

#[async_trait]
impl UserDirectory for PostgresDirectory {
    async fn find_store_partners(&self, store_id: &str) -> Result<Vec<UserRecord>, DirectoryError> {
        let rows = sqlx::query(
            "SELECT user_id, role, store_id, push_token \
             FROM users WHERE store_id = $1 AND role = 'partner'",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query(
            "SELECT user_id, role, store_id, push_token FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_record))
    }
}
