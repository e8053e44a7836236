//! HTTP error taxonomy and its JSON rendering.

use axum::{
    Json,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::auth::LoginError;

/// Body of every 4xx/5xx response.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token not provided or invalid")]
    Unauthenticated,
    #[error("access denied")]
    Forbidden,
    #[error("route not found: {method} {path}")]
    NotFound { path: String, method: String },
    /// Detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::MissingCredentials => Self::MissingCredentials,
            LoginError::InvalidCredentials => Self::InvalidCredentials,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::MissingCredentials => json!({ "error": "Username and password are required" }),
            Self::InvalidCredentials => json!({ "error": "Invalid credentials" }),
            Self::Unauthenticated => json!({ "error": "Token not provided or invalid" }),
            Self::Forbidden => json!({ "error": "Access denied" }),
            Self::NotFound { path, method } => {
                warn!("Route not found: {method} {path}");
                json!({ "error": "Route not found", "path": path, "method": method })
            }
            Self::Internal(detail) => {
                error!("Internal server error: {detail}");
                json!({ "error": "Internal server error", "statusCode": status.as_u16() })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Router fallback for unmatched routes. The echoed path keeps the query.
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound {
        path: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string),
        method: method.to_string(),
    }
}

/// Render a handler panic as the generic 500.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
