use utoipa::OpenApi;

use crate::{
    error::ErrorBody,
    handler,
    handler::{
        auth::{
            LoginRequest, LogoutRequest, RegisterRequest, ResendVerificationRequest,
            VerifyEmailRequest,
        },
        health::Health,
        passwords::{ChangePasswordRequest, PasswordResetConfirmRequest, PasswordResetRequest},
        profile::UpdateProfileRequest,
        responses::{AuthTokensResponse, MessageResponse, SocialAccountResponse, UserResponse},
        social::SocialLoginRequest,
        tokens::{RefreshRequest, RefreshResponse, VerifyTokenRequest},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health::health,
        handler::auth::register,
        handler::auth::login,
        handler::auth::logout,
        handler::auth::verify_email,
        handler::auth::resend_email,
        handler::tokens::refresh,
        handler::tokens::verify,
        handler::passwords::change,
        handler::passwords::request_reset,
        handler::passwords::confirm_reset,
        handler::profile::get_profile,
        handler::profile::update_profile,
        handler::social::social_login,
        handler::social::list_social_accounts,
        handler::social::disconnect
    ),
    components(schemas(
        Health,
        ErrorBody,
        MessageResponse,
        UserResponse,
        SocialAccountResponse,
        AuthTokensResponse,
        RegisterRequest,
        LoginRequest,
        LogoutRequest,
        VerifyEmailRequest,
        ResendVerificationRequest,
        RefreshRequest,
        RefreshResponse,
        VerifyTokenRequest,
        ChangePasswordRequest,
        PasswordResetRequest,
        PasswordResetConfirmRequest,
        UpdateProfileRequest,
        SocialLoginRequest
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "auth", description = "Registration, login, email verification"),
        (name = "tokens", description = "JWT refresh and verification"),
        (name = "password", description = "Password change and reset"),
        (name = "profile", description = "Current account profile"),
        (name = "social", description = "OAuth account linking")
    )
)]
pub struct ApiDoc;
