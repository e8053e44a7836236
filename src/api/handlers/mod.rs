//! Route handlers. Everything except `login` and `health` sits behind the
//! authentication and authorization stages.

pub mod health;
pub mod login;
pub mod mock;
