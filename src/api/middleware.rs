//! Request stages guarding the protected routes.
//!
//! `authenticate` turns a `Bearer` token into an [`Identity`] request
//! extension; `authorize` checks that identity's role against the permission
//! table for the exact request path. Both reject with the generic
//! [`ApiError`] bodies and never tell the caller why a token was refused.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use super::{AppState, error::ApiError};
use crate::auth::Claims;

/// Decoded claims of the caller, available to handlers behind `authenticate`.
#[derive(Clone, Debug)]
pub struct Identity(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication stage.
///
/// # Errors
/// `ApiError::Unauthenticated` if the header is missing or malformed, or the
/// token fails verification.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        warn!(path = request.uri().path(), "Missing or malformed bearer token");
        return Err(ApiError::Unauthenticated);
    };

    let claims = state.codec.decode(token).map_err(|err| {
        warn!(path = request.uri().path(), error = ?err, "Rejected bearer token");
        ApiError::Unauthenticated
    })?;

    request.extensions_mut().insert(Identity(claims));

    Ok(next.run(request).await)
}

/// Authorization stage; must run after [`authenticate`].
///
/// # Errors
/// `ApiError::Forbidden` if the caller's role is not granted the request path,
/// `ApiError::Unauthenticated` if no identity is attached.
pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(Identity(claims)) = request.extensions().get::<Identity>() else {
        return Err(ApiError::Unauthenticated);
    };

    let path = request.uri().path();

    if !state.permissions.allows(claims.role, path) {
        warn!(
            username = %claims.username,
            role = %claims.role,
            path,
            "Access denied"
        );
        return Err(ApiError::Forbidden);
    }

    info!(
        username = %claims.username,
        role = %claims.role,
        path,
        "Access granted"
    );

    Ok(next.run(request).await)
}
