//! Login flow: credential check, last-login bookkeeping, token issuance.
//!
//! Single pass, no retries. An unknown username and a wrong password produce
//! the same `InvalidCredentials` so callers cannot enumerate accounts.

use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::{TokenCodec, TokenError, password};
use crate::store::{PublicUser, StoreError, UserStore};

/// Login request body. Fields are optional so that absence is reported as
/// `MissingCredentials` instead of a deserialization failure.
#[derive(ToSchema, Deserialize, Default, Clone)]
pub struct Credentials {
    #[serde(default, deserialize_with = "any_value")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "any_value")]
    pub password: Option<String>,
}

/// Accept any JSON value for a credential field. Falsy values count as
/// absent; other non-strings keep their JSON text and never match an account.
fn any_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null | Value::Bool(false)) => None,
        Some(Value::Number(number))
            if number.as_f64().is_some_and(|n| n.abs() < f64::EPSILON) =>
        {
            None
        }
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

impl Credentials {
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential store failure: {0}")]
    Store(#[from] StoreError),
    #[error("token signing failure: {0}")]
    Token(#[from] TokenError),
    #[error("password verification task failed: {0}")]
    Verifier(#[from] tokio::task::JoinError),
}

/// Turn a username/password pair into a signed token.
///
/// Records `last_login` on success; a failure to do so is logged and does not
/// prevent the token from being issued.
///
/// # Errors
/// `MissingCredentials` for absent or empty fields, `InvalidCredentials` for
/// an unknown user or wrong password, and the infrastructure variants when the
/// store, the hashing task or token signing fails.
pub async fn login(
    store: &dyn UserStore,
    codec: &TokenCodec,
    credentials: Credentials,
) -> Result<LoginOutcome, LoginError> {
    let (username, plaintext) = match (credentials.username, credentials.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => return Err(LoginError::MissingCredentials),
    };

    // bcrypt is CPU bound, keep it off the async workers
    let Some(user) = store.find_by_username(&username).await? else {
        // same bcrypt cost as a wrong password
        tokio::task::spawn_blocking(move || password::verify_absent(&plaintext)).await?;
        warn!(%username, "Login failed: unknown user");
        return Err(LoginError::InvalidCredentials);
    };

    let stored_hash = user.password_hash.clone();
    let matches =
        tokio::task::spawn_blocking(move || password::verify(&plaintext, &stored_hash)).await?;

    if !matches {
        warn!(%username, "Login failed: wrong password");
        return Err(LoginError::InvalidCredentials);
    }

    if let Err(err) = store.update_last_login(user.id, Utc::now()).await {
        error!(%username, "Failed to update last login: {err}");
    }

    let token = codec.issue(user.id, &user.username, user.role)?;

    info!(%username, role = %user.role, "Login successful");

    Ok(LoginOutcome {
        token,
        user: PublicUser::from(&user),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        auth::Role,
        store::{MemoryUserStore, NewUser, User, seed_initial_users},
    };
    use async_trait::async_trait;
    use chrono::DateTime;
    use secrecy::SecretString;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::{Duration, Instant},
    };
    use uuid::Uuid;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            &SecretString::from("test-secret".to_string()),
            Duration::from_secs(3600),
        )
    }

    /// Wraps a store and counts last-login writes, optionally failing them.
    struct Recording {
        inner: MemoryUserStore,
        updates: AtomicUsize,
        fail_updates: bool,
    }

    impl Recording {
        async fn seeded(fail_updates: bool) -> Self {
            let inner = MemoryUserStore::new();
            seed_initial_users(&inner).await.unwrap();
            Self {
                inner,
                updates: AtomicUsize::new(0),
                fail_updates,
            }
        }

        fn updates(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UserStore for Recording {
        async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
            self.inner.find_by_username(username).await
        }

        async fn update_last_login(
            &self,
            id: Uuid,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_updates {
                return Err(StoreError::NotFound(id));
            }
            self.inner.update_last_login(id, at).await
        }

        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            self.inner.insert(user).await
        }

        async fn count(&self) -> Result<i64, StoreError> {
            self.inner.count().await
        }
    }

    /// Store whose backend is unreachable.
    struct Unreachable;

    #[async_trait]
    impl UserStore for Unreachable {
        async fn find_by_username(&self, _: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn update_last_login(&self, _: Uuid, _: DateTime<Utc>) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn insert(&self, _: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn count(&self) -> Result<i64, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn valid_credentials_issue_token_with_stored_role() {
        let store = Recording::seeded(false).await;
        let codec = codec();

        let outcome = login(&store, &codec, Credentials::new("admin", "1234"))
            .await
            .unwrap();

        let claims = codec.decode(&outcome.token).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.sub, outcome.user.id);
        assert_eq!(outcome.user.name, "Administrator");
        assert_eq!(store.updates(), 1);

        let stored = store.inner.find_by_username("admin").await.unwrap().unwrap();
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_indistinguishable() {
        let store = Recording::seeded(false).await;
        let codec = codec();

        let unknown = login(&store, &codec, Credentials::new("ghost", "1234")).await;
        let wrong = login(&store, &codec, Credentials::new("admin", "4321")).await;

        assert!(matches!(unknown, Err(LoginError::InvalidCredentials)));
        assert!(matches!(wrong, Err(LoginError::InvalidCredentials)));
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn unknown_user_pays_the_bcrypt_cost() {
        let store = Recording::seeded(false).await;
        let codec = codec();

        // first call prepares the absent-user hash
        let _ = login(&store, &codec, Credentials::new("ghost", "1234")).await;

        let started = Instant::now();
        let _ = login(&store, &codec, Credentials::new("admin", "4321")).await;
        let wrong_password = started.elapsed();

        let started = Instant::now();
        let _ = login(&store, &codec, Credentials::new("ghost", "1234")).await;
        let unknown_user = started.elapsed();

        assert!(
            unknown_user * 4 >= wrong_password,
            "unknown user took {unknown_user:?}, wrong password took {wrong_password:?}"
        );
    }

    #[tokio::test]
    async fn missing_or_empty_fields_are_rejected_before_lookup() {
        let codec = codec();
        let cases = [
            Credentials::default(),
            Credentials {
                username: Some("admin".to_string()),
                password: None,
            },
            Credentials {
                username: None,
                password: Some("1234".to_string()),
            },
            Credentials::new("", "1234"),
            Credentials::new("admin", ""),
        ];

        for credentials in cases {
            // an unreachable store proves the lookup never happens
            assert!(matches!(
                login(&Unreachable, &codec, credentials).await,
                Err(LoginError::MissingCredentials)
            ));
        }
    }

    #[tokio::test]
    async fn last_login_failure_does_not_block_token() {
        let store = Recording::seeded(true).await;
        let codec = codec();

        let outcome = login(&store, &codec, Credentials::new("user", "1234"))
            .await
            .unwrap();

        assert_eq!(codec.decode(&outcome.token).unwrap().role, Role::User);
        assert_eq!(store.updates(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_infrastructure_error() {
        let result = login(&Unreachable, &codec(), Credentials::new("admin", "1234")).await;
        assert!(matches!(result, Err(LoginError::Store(_))));
    }

    #[test]
    fn non_string_fields_deserialize_as_present_or_absent() {
        let parse = |body: &str| serde_json::from_str::<Credentials>(body).unwrap();

        let numeric = parse(r#"{ "username": 123, "password": "x" }"#);
        assert_eq!(numeric.username.as_deref(), Some("123"));
        assert_eq!(numeric.password.as_deref(), Some("x"));

        let falsy = parse(r#"{ "username": 0, "password": false }"#);
        assert!(falsy.username.is_none());
        assert!(falsy.password.is_none());

        let nulls = parse(r#"{ "username": null }"#);
        assert!(nulls.username.is_none());
        assert!(nulls.password.is_none());
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
