//! Signed, time-bounded access tokens (JWT, HS256).
//!
//! Validation pins HS256: a token whose header names any other algorithm is
//! rejected before the signature is looked at. Expiry is strict unless a
//! leeway is configured.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use super::Role;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claim set carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expires-at, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, expired, malformed or missing claims.
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"***")
            .field("ttl", &self.ttl)
            .field("leeway", &self.validation.leeway)
            .finish()
    }
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            ttl,
            validation,
        }
    }

    /// Tolerate this much clock skew when checking `exp`.
    #[must_use]
    pub fn with_leeway_seconds(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Sign a token for the given identity, valid from now for the configured TTL.
    ///
    /// # Errors
    /// Returns `TokenError::Sign` if the claims cannot be encoded.
    pub fn issue(&self, sub: Uuid, username: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(sub, username, role, Utc::now().timestamp())
    }

    /// Same as [`TokenCodec::issue`] with an explicit issued-at (unix seconds).
    ///
    /// # Errors
    /// Returns `TokenError::Sign` if the claims cannot be encoded.
    pub fn issue_at(
        &self,
        sub: Uuid,
        username: &str,
        role: Role,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub,
            username: username.to_string(),
            role,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Verify signature, algorithm and expiry, then return the claims.
    ///
    /// # Errors
    /// Every failure collapses to `TokenError::Invalid`; the source error is
    /// kept for logging only.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&SecretString::from(secret.to_string()), HOUR)
    }

    fn admin_id() -> Uuid {
        Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
    }

    #[test]
    fn decode_returns_issued_claims() {
        let codec = codec("s3cret");
        let now = Utc::now().timestamp();
        let token = codec.issue_at(admin_id(), "admin", Role::Admin, now).unwrap();

        let claims = codec.decode(&token).unwrap();
        assert_eq!(
            claims,
            Claims {
                sub: admin_id(),
                username: "admin".to_string(),
                role: Role::Admin,
                iat: now,
                exp: now + 3600,
            }
        );
    }

    #[test]
    fn issue_is_deterministic_for_fixed_time() {
        let codec = codec("s3cret");
        let a = codec.issue_at(admin_id(), "admin", Role::Admin, 1_700_000_000).unwrap();
        let b = codec.issue_at(admin_id(), "admin", Role::Admin, 1_700_000_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decode_rejects_expired_token() {
        let codec = codec("s3cret");
        let two_hours_ago = Utc::now().timestamp() - 7200;
        let token = codec
            .issue_at(admin_id(), "admin", Role::Admin, two_hours_ago)
            .unwrap();

        assert!(matches!(codec.decode(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn leeway_tolerates_recent_expiry() {
        let codec = codec("s3cret").with_leeway_seconds(300);
        let issued = Utc::now().timestamp() - 3600 - 60;
        let token = codec.issue_at(admin_id(), "admin", Role::Admin, issued).unwrap();

        assert!(codec.decode(&token).is_ok());
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let token = codec("s3cret").issue(admin_id(), "admin", Role::Admin).unwrap();

        for other in ["S3cret", "s3cret ", "another-secret", "x"] {
            assert!(
                matches!(codec(other).decode(&token), Err(TokenError::Invalid(_))),
                "secret {other:?} must not validate"
            );
        }
    }

    #[test]
    fn decode_rejects_other_hmac_algorithm() {
        let codec = codec("s3cret");
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: admin_id(),
            username: "admin".to_string(),
            role: Role::Admin,
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        assert!(matches!(codec.decode(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn decode_rejects_unsigned_token() {
        // {"alg":"none","typ":"JWT"}
        let header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";
        let token = codec("s3cret").issue(admin_id(), "admin", Role::Admin).unwrap();
        let payload = token.split('.').nth(1).unwrap();

        let forged = format!("{header}.{payload}.");
        assert!(codec("s3cret").decode(&forged).is_err());
    }

    #[test]
    fn decode_rejects_missing_claims() {
        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(ALGORITHM),
            &json!({ "sub": admin_id(), "iat": now, "exp": now + 60 }),
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        assert!(codec("s3cret").decode(&token).is_err());
    }

    #[test]
    fn decode_rejects_unknown_role() {
        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(ALGORITHM),
            &json!({
                "sub": admin_id(),
                "username": "root",
                "role": "superuser",
                "iat": now,
                "exp": now + 60,
            }),
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        assert!(codec("s3cret").decode(&token).is_err());
    }

    #[test]
    fn decode_rejects_malformed_input() {
        let codec = codec("s3cret");
        for garbage in ["", "invalid_token", "a.b.c", "!!!.@@@.###", "a.b"] {
            assert!(codec.decode(garbage).is_err(), "{garbage:?} must not decode");
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", codec("very-secret-value"));
        assert!(!rendered.contains("very-secret-value"));
        assert!(rendered.contains("***"));
    }
}
