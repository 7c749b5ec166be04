use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{Error, ErrorBody},
    handler::{
        extract::CurrentAccount,
        responses::{AuthTokensResponse, MessageResponse},
    },
    service::{auth::RegisterInput, email, verification::TokenPurpose},
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResendVerificationRequest {
    pub email: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/verify-email", post(verify_email))
        .route("/api/v1/auth/resend-email", post(resend_email))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthTokensResponse),
        (status = 400, description = "Validation failed", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    actor: Option<CurrentAccount>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthTokensResponse>), Error> {
    let output = state
        .auth()
        .register(RegisterInput {
            email: payload.email,
            password: payload.password,
            password2: payload.password2,
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone: payload.phone,
            created_by: actor.map(|actor| actor.0.uid),
        })
        .await?;

    // Best-effort delivery: registration stays non-blocking for local/dev
    // stacks without a mail sink.
    if let Err(err) = email::try_send_verification_email(
        state.config().values(),
        &output.account.email,
        &output.verify_token,
    )
    .await
    {
        tracing::warn!(error = %err, "failed to send verification email");
    }

    let pair = state.tokens().issue(&output.account).await?;
    let profile = state.accounts().profile(&output.account).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthTokensResponse {
            access: pair.access,
            refresh: pair.refresh,
            user: profile.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthTokensResponse),
        (status = 400, description = "Invalid credentials", body = ErrorBody),
        (status = 403, description = "Account disabled", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokensResponse>, Error> {
    let account = state.auth().login(&payload.email, &payload.password).await?;
    let pair = state.tokens().issue(&account).await?;
    let profile = state.accounts().profile(&account).await?;

    Ok(Json(AuthTokensResponse {
        access: pair.access,
        refresh: pair.refresh,
        user: profile.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 400, description = "Missing refresh token", body = ErrorBody),
        (status = 401, description = "Invalid refresh token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    account: CurrentAccount,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let Some(refresh) = payload.refresh.filter(|token| !token.is_empty()) else {
        return Err(Error::validation("refresh", "This field is required."));
    };

    state.tokens().revoke(&refresh).await?;
    tracing::info!(email = %account.0.email, uid = %account.0.uid, "logout");
    Ok(Json(MessageResponse::new("Successfully logged out")))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let account_id = state
        .verification()
        .consume(&payload.token, TokenPurpose::VerifyEmail)
        .await?;
    state.accounts().mark_email_verified(account_id).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-email",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Always reported as sent", body = MessageResponse),
        (status = 400, description = "Validation failed", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn resend_email(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, Error> {
    if let Some(account) = state.accounts().get_by_email(&payload.email).await? {
        if account.is_active && account.email_verified_at.is_none() {
            let issued = state
                .verification()
                .issue(account.id, TokenPurpose::VerifyEmail)
                .await?;
            if let Err(err) = email::try_send_verification_email(
                state.config().values(),
                &account.email,
                &issued.token,
            )
            .await
            {
                tracing::warn!(error = %err, "failed to resend verification email");
            }
        }
    }
    // Same response whether or not the address is registered.
    Ok(Json(MessageResponse::new("Verification e-mail sent.")))
}
