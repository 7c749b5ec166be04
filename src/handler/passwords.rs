use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{Error, ErrorBody},
    handler::{extract::CurrentAccount, responses::MessageResponse},
    service::{email, passwords::ChangePasswordInput},
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub uid: String,
    pub token: String,
    pub new_password: String,
    pub new_password2: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/password/change", post(change))
        .route("/api/v1/auth/password/reset", post(request_reset))
        .route("/api/v1/auth/password/reset/confirm", post(confirm_reset))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password/change",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "password"
)]
pub async fn change(
    State(state): State<Arc<AppState>>,
    account: CurrentAccount,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    state
        .passwords()
        .change(
            &account.0,
            ChangePasswordInput {
                old_password: payload.old_password,
                new_password: payload.new_password,
                new_password2: payload.new_password2,
            },
        )
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password/reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Always reported as sent", body = MessageResponse),
        (status = 400, description = "Validation failed", body = ErrorBody)
    ),
    tag = "password"
)]
pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, Error> {
    if let Some(request) = state.passwords().request_reset(&payload.email).await? {
        if let Err(err) = email::try_send_reset_email(
            state.config().values(),
            &request.account.email,
            request.account.uid,
            &request.token.token,
        )
        .await
        {
            tracing::warn!(error = %err, "failed to send password reset email");
        }
    }
    // Identical response for unknown addresses; no account enumeration.
    Ok(Json(MessageResponse::new(
        "Password reset e-mail has been sent.",
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password/reset/confirm",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid token or validation failure", body = ErrorBody)
    ),
    tag = "password"
)]
pub async fn confirm_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let uid = Uuid::parse_str(&payload.uid).map_err(|_| Error::InvalidResetToken)?;
    state
        .passwords()
        .confirm_reset(
            uid,
            &payload.token,
            &payload.new_password,
            &payload.new_password2,
        )
        .await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset with the new password.",
    )))
}
