//! # Rolegate (token authentication & role-based path authorization)
//!
//! `rolegate` turns a username/password pair into a signed, time-bounded token
//! and gates protected routes with two request stages:
//!
//! 1. **Authentication:** the `Authorization: Bearer <token>` header is decoded
//!    with a pinned HMAC-SHA256 validation. Missing, malformed, expired and
//!    badly signed tokens all produce the same `401` body.
//! 2. **Authorization:** the decoded role is looked up in a static permission
//!    table (`role -> exact paths`) loaded once at startup. A path outside the
//!    role's set produces `403`.
//!
//! ## Credentials
//!
//! Users live in Postgres with bcrypt password hashes. Unknown usernames and
//! wrong passwords are indistinguishable to the caller. A successful login
//! records the last-login timestamp on a best-effort basis.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
