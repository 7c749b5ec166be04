use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{Error, ErrorBody},
    handler::{extract::CurrentAccount, responses::UserResponse},
    service::accounts::UpdateProfileInput,
    state::AppState,
};

/// Mutable profile attributes only. Email, password, and identifiers never
/// change through this surface.
#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/profile", get(get_profile))
        .route("/api/v1/auth/profile", patch(update_profile))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    responses(
        (status = 200, description = "Current account", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "profile"
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    account: CurrentAccount,
) -> Result<Json<UserResponse>, Error> {
    let profile = state.accounts().profile(&account.0).await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "profile"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    account: CurrentAccount,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, Error> {
    let updated = state
        .accounts()
        .update_profile(
            &account.0,
            UpdateProfileInput {
                first_name: payload.first_name,
                last_name: payload.last_name,
                phone: payload.phone,
                bio: payload.bio,
                avatar: payload.avatar,
            },
        )
        .await?;
    let profile = state.accounts().profile(&updated).await?;
    Ok(Json(profile.into()))
}
