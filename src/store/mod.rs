//! User records and the credential store abstraction.
//!
//! The login flow only needs lookup by username and a last-login write; the
//! store owns concurrency. `PgUserStore` backs the server, `MemoryUserStore`
//! backs tests and embedders that do not want a database.

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Role, password};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username already exists: {0}")]
    DuplicateUsername(String),
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Password(#[from] password::PasswordError),
}

/// Stored identity record.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub last_login: Option<DateTime<Utc>>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("last_login", &self.last_login)
            .finish()
    }
}

/// User view safe to return to clients (no password hash).
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Record to insert; the password is already hashed.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

impl NewUser {
    /// Hash `password` and build an insertable record.
    ///
    /// # Errors
    /// Returns an error if the username is empty or hashing fails.
    pub fn with_password(
        username: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<Self, StoreError> {
        if username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        Ok(Self {
            username: username.to_string(),
            password_hash: password::hash(password)?,
            name: name.to_string(),
            role,
        })
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by exact username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Set `last_login` on the user with `id`.
    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Insert a new user; usernames are unique and non-empty.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Number of stored users.
    async fn count(&self) -> Result<i64, StoreError>;
}

/// Create the development users (`admin/1234`, `user/1234`) when the store is empty.
///
/// Returns the number of users created.
///
/// # Errors
/// Returns an error if the store cannot be queried or written.
pub async fn seed_initial_users(store: &dyn UserStore) -> Result<usize, StoreError> {
    if store.count().await? > 0 {
        return Ok(0);
    }

    info!("Seeding initial users");

    let seeds = [
        ("admin", "1234", "Administrator", Role::Admin),
        ("user", "1234", "Regular User", Role::User),
    ];

    for (username, password, name, role) in seeds {
        let user = NewUser::with_password(username, password, name, role)?;
        store.insert(user).await?;
    }

    info!("Initial users seeded successfully");

    Ok(seeds.len())
}
