//! Protected demo payloads echoing the caller's identity.

use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    api::{error::ApiError, error::ErrorBody, middleware::Identity},
    auth::Role,
};

const MOCK_RESPONSE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/config/mock-response.json"
));

/// Identity fields copied into every mock payload.
#[derive(ToSchema, Serialize, Debug)]
pub struct MockUser {
    username: String,
    uuid: Uuid,
    role: Role,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Static mock document merged with the caller's identity.
fn payload(identity: &Identity) -> Result<Map<String, Value>, ApiError> {
    let mut document: Map<String, Value> = serde_json::from_str(MOCK_RESPONSE)
        .map_err(|err| ApiError::Internal(format!("invalid mock document: {err}")))?;

    let user = MockUser {
        username: identity.0.username.clone(),
        uuid: identity.0.sub,
        role: identity.0.role,
    };
    let user = serde_json::to_value(user)
        .map_err(|err| ApiError::Internal(format!("failed to encode user: {err}")))?;

    document.insert("user".to_string(), user);

    Ok(document)
}

#[utoipa::path(
    get,
    path= "/mock",
    responses (
        (status = 200, description = "Mock data with the caller's identity"),
        (status = 401, description = "Token not provided or invalid", body = ErrorBody),
        (status = 403, description = "Role not allowed on this path", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "mock"
)]
pub async fn mock(identity: Identity) -> Result<Json<Map<String, Value>>, ApiError> {
    let body = payload(&identity)?;

    info!("Mock data retrieved by user: {}", identity.0.username);

    Ok(Json(body))
}

#[utoipa::path(
    get,
    path= "/admin-mock",
    responses (
        (status = 200, description = "Mock data with admin details"),
        (status = 401, description = "Token not provided or invalid", body = ErrorBody),
        (status = 403, description = "Role not allowed on this path", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "mock"
)]
pub async fn admin_mock(identity: Identity) -> Result<Json<Map<String, Value>>, ApiError> {
    let mut body = payload(&identity)?;
    body.insert(
        "adminData".to_string(),
        json!({
            "isAdmin": true,
            "adminAccess": "full",
            "adminTimestamp": timestamp(),
        }),
    );

    info!("Admin mock data retrieved by admin: {}", identity.0.username);

    Ok(Json(body))
}

#[utoipa::path(
    get,
    path= "/user-mock",
    responses (
        (status = 200, description = "Mock data with user details"),
        (status = 401, description = "Token not provided or invalid", body = ErrorBody),
        (status = 403, description = "Role not allowed on this path", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "mock"
)]
pub async fn user_mock(identity: Identity) -> Result<Json<Map<String, Value>>, ApiError> {
    let mut body = payload(&identity)?;
    body.insert(
        "userData".to_string(),
        json!({
            "accessLevel": "standard",
            "userTimestamp": timestamp(),
        }),
    );

    info!("User mock data retrieved by user: {}", identity.0.username);

    Ok(Json(body))
}
