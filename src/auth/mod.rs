//! Credential verification, token issuance and role-to-path authorization.
//!
//! Nothing in here knows about HTTP: the `api` module wires these pieces into
//! the login handler and the authentication/authorization request stages.

pub mod login;
pub mod password;
pub mod permissions;
pub mod role;
pub mod token;

pub use login::{Credentials, LoginError, LoginOutcome, login};
pub use permissions::{PermissionTable, PermissionsError};
pub use role::Role;
pub use token::{Claims, TokenCodec, TokenError};
