use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{Error, ErrorBody},
    handler::{
        extract::CurrentAccount,
        responses::{AuthTokensResponse, MessageResponse, SocialAccountResponse},
    },
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct SocialLoginRequest {
    /// OAuth access token obtained from the provider by the client.
    pub access_token: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/social/accounts", get(list_social_accounts))
        .route("/api/v1/auth/social/:provider", post(social_login))
        .route(
            "/api/v1/auth/social/disconnect/:provider",
            delete(disconnect),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/social/{provider}",
    request_body = SocialLoginRequest,
    params(
        ("provider" = String, Path, description = "google | facebook | github")
    ),
    responses(
        (status = 200, description = "Logged in", body = AuthTokensResponse),
        (status = 400, description = "Invalid provider token", body = ErrorBody),
        (status = 403, description = "Account disabled", body = ErrorBody)
    ),
    tag = "social"
)]
pub async fn social_login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(payload): Json<SocialLoginRequest>,
) -> Result<Json<AuthTokensResponse>, Error> {
    let account = state
        .social()
        .login_with_provider(&provider, &payload.access_token)
        .await?;
    let pair = state.tokens().issue(&account).await?;
    let profile = state.accounts().profile(&account).await?;

    Ok(Json(AuthTokensResponse {
        access: pair.access,
        refresh: pair.refresh,
        user: profile.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/social/accounts",
    responses(
        (status = 200, description = "Linked identities", body = [SocialAccountResponse]),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "social"
)]
pub async fn list_social_accounts(
    State(state): State<Arc<AppState>>,
    account: CurrentAccount,
) -> Result<Json<Vec<SocialAccountResponse>>, Error> {
    let identities = state.social().list(&account.0).await?;
    Ok(Json(identities.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/auth/social/disconnect/{provider}",
    params(
        ("provider" = String, Path, description = "Provider to unlink")
    ),
    responses(
        (status = 200, description = "Disconnected", body = MessageResponse),
        (status = 400, description = "Last auth method", body = ErrorBody),
        (status = 404, description = "No such linked identity", body = ErrorBody)
    ),
    tag = "social"
)]
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    account: CurrentAccount,
    Path(provider): Path<String>,
) -> Result<Json<MessageResponse>, Error> {
    state.social().disconnect(&account.0, &provider).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} account disconnected successfully",
        title_case(&provider)
    ))))
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
