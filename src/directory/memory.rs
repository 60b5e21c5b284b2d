//! In-memory user directory backed by DashMap.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{DirectoryError, Role, UserDirectory, UserRecord};

/// In-memory directory for development and tests.
///
/// Records are keyed by user id; store/role queries scan all entries, which
/// is fine at the scale this backend is meant for.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<String, UserRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record.
    pub fn insert(&self, record: UserRecord) {
        self.users.insert(record.user_id.clone(), record);
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_store_partners(&self, store_id: &str) -> Result<Vec<UserRecord>, DirectoryError> {
        let partners = self
            .users
            .iter()
            .filter(|entry| {
                entry.role == Role::Partner && entry.store_id.as_deref() == Some(store_id)
            })
            .map(|entry| entry.value().clone())
            .collect();
        Ok(partners)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.get(user_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner(user_id: &str, store_id: &str, token: Option<&str>) -> UserRecord {
        UserRecord {
            user_id: user_id.to_string(),
            role: Role::Partner,
            store_id: Some(store_id.to_string()),
            push_token: token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_find_store_partners_filters_by_store_and_role() {
        let directory = MemoryDirectory::new();
        directory.insert(partner("p1", "S1", Some("T1")));
        directory.insert(partner("p2", "S2", Some("T2")));
        directory.insert(UserRecord {
            user_id: "c1".to_string(),
            role: Role::Customer,
            store_id: Some("S1".to_string()),
            push_token: Some("T3".to_string()),
        });

        let partners = directory.find_store_partners("S1").await.unwrap();
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].user_id, "p1");
    }

    #[tokio::test]
    async fn test_find_user_missing_returns_none() {
        let directory = MemoryDirectory::new();
        assert!(directory.find_user("nobody").await.unwrap().is_none());
    }
}
