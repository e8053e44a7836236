use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{NewUser, StoreError, User, UserStore};
use crate::auth::Role;

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            role: role
                .parse::<Role>()
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            last_login: row.try_get("last_login")?,
        })
    }
}

/// Create the `users` table if it does not exist.
///
/// # Errors
/// Returns an error if any schema statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in SCHEMA_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Postgres-backed credential store.
#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "SELECT");
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT id, username, password_hash, name, role, last_login
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .instrument(span)
        .await?;

        Ok(user)
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "UPDATE");
        let result = sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        if user.username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }

        let span = info_span!("db.query", db.system = "postgresql", db.operation = "INSERT");
        sqlx::query_as::<_, User>(
            r"
            INSERT INTO users (id, username, password_hash, name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, password_hash, name, role, last_login
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .instrument(span)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateUsername(user.username.clone())
            }
            other => StoreError::Database(other),
        })
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }
}
