use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    api::{AppState, error::ApiError, error::ErrorBody},
    auth::{self, Credentials},
    store::PublicUser,
};

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    token: String,
    user: PublicUser,
}

#[utoipa::path(
    post,
    path= "/login",
    request_body = Credentials,
    responses (
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Username or password missing", body = ErrorBody),
        (status = 401, description = "Unknown user or wrong password", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    ),
    tag= "auth"
)]
// axum handler for login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Option<Json<Credentials>>,
) -> Result<Json<LoginResponse>, ApiError> {
    // a missing or unparsable body is treated as missing credentials
    let credentials = payload.map(|Json(payload)| payload).unwrap_or_default();

    let outcome = auth::login(state.store.as_ref(), &state.codec, credentials).await?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        user: outcome.user,
    }))
}
