//! Password hashing and verification (bcrypt).
//!
//! The salt and cost are embedded in the returned hash string, so `verify`
//! needs nothing but the stored value.

use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

/// bcrypt cost factor (2^10 rounds).
pub const HASH_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
/// Returns an error if the hashing backend fails; callers treat this as an
/// infrastructure failure, never as a wrong password.
pub fn hash(plaintext: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(plaintext, HASH_COST)?)
}

/// Check a candidate plaintext against a stored bcrypt hash.
///
/// Comparison of the derived digests is constant time. A malformed stored
/// hash yields `false` and a warning, never an error.
#[must_use]
pub fn verify(plaintext: &str, stored_hash: &str) -> bool {
    match bcrypt::verify(plaintext, stored_hash) {
        Ok(matches) => matches,
        Err(err) => {
            warn!("Rejecting password check against malformed hash: {err}");
            false
        }
    }
}

/// Hash checked when the username is unknown, so that branch costs as much as
/// a wrong password.
fn absent_user_hash() -> Option<&'static str> {
    static ABSENT_USER_HASH: OnceLock<Option<String>> = OnceLock::new();

    ABSENT_USER_HASH
        .get_or_init(|| match hash("rolegate-absent-user") {
            Ok(hashed) => Some(hashed),
            Err(err) => {
                warn!("Failed to prepare absent-user hash: {err}");
                None
            }
        })
        .as_deref()
}

/// Run a full bcrypt check for a user that does not exist. Always `false`.
#[must_use]
pub fn verify_absent(plaintext: &str) -> bool {
    if let Some(stored_hash) = absent_user_hash() {
        let _ = verify(plaintext, stored_hash);
    }
    false
}
