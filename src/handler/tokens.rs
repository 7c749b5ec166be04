use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{Error, ErrorBody},
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access: String,
    /// Present only when rotation-on-use is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyTokenRequest {
    pub token: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/token/refresh", post(refresh))
        .route("/api/v1/auth/token/verify", post(verify))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token (and rotated refresh token)", body = RefreshResponse),
        (status = 401, description = "Invalid, expired, or revoked token", body = ErrorBody)
    ),
    tag = "tokens"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, Error> {
    let refreshed = state.tokens().refresh(&payload.refresh).await?;
    Ok(Json(RefreshResponse {
        access: refreshed.access,
        refresh: refreshed.refresh,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/token/verify",
    request_body = VerifyTokenRequest,
    responses(
        (status = 200, description = "Token is valid"),
        (status = 401, description = "Token is invalid", body = ErrorBody)
    ),
    tag = "tokens"
)]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyTokenRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    state.tokens().verify(&payload.token).await?;
    Ok(Json(serde_json::json!({})))
}
