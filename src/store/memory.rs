use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::RwLock};
use uuid::Uuid;

use super::{NewUser, StoreError, User, UserStore};

/// In-process store keyed by username.
///
/// Locks are never held across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Database(sqlx::Error::Protocol(
            "memory store lock poisoned".to_string(),
        ))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.get(username).cloned())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        let user = users
            .values_mut()
            .find(|user| user.id == id)
            .ok_or(StoreError::NotFound(id))?;
        user.last_login = Some(at);
        Ok(())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        if user.username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }

        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        if users.contains_key(&user.username) {
            return Err(StoreError::DuplicateUsername(user.username));
        }

        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            last_login: None,
        };
        users.insert(record.username.clone(), record.clone());
        Ok(record)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(i64::try_from(users.len()).unwrap_or(i64::MAX))
    }
}
