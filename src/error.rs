use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use utoipa::ToSchema;

/// Error envelope returned by every failing endpoint:
/// `{"message": <human string>, "errors": {<field>: <detail>}}`.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    #[schema(value_type = Object)]
    pub errors: Value,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed")]
    Validation { field: &'static str, detail: String },

    #[error("A user with this email already exists.")]
    DuplicateEmail,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("User account is disabled.")]
    AccountDisabled,

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Provider token is invalid or expired")]
    ProviderTokenInvalid { detail: String },

    #[error("Cannot disconnect the only login method. Please set a password first.")]
    LastAuthMethod,

    #[error("No {0} account is connected")]
    IdentityNotFound(String),

    #[error("Old password is incorrect")]
    InvalidOldPassword,

    #[error("Password fields didn't match.")]
    PasswordMismatch { field: &'static str },

    #[error("Password does not meet the strength policy")]
    WeakPassword { field: &'static str, detail: String },

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("Resource not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: &'static str, detail: impl Into<String>) -> Self {
        Error::Validation {
            field,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. }
            | Error::DuplicateEmail
            | Error::InvalidCredentials
            | Error::ProviderTokenInvalid { .. }
            | Error::LastAuthMethod
            | Error::InvalidOldPassword
            | Error::PasswordMismatch { .. }
            | Error::WeakPassword { .. }
            | Error::InvalidResetToken
            | Error::InvalidVerificationToken => StatusCode::BAD_REQUEST,
            Error::AccountDisabled => StatusCode::FORBIDDEN,
            Error::TokenInvalid | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::IdentityNotFound(_) | Error::NotFound => StatusCode::NOT_FOUND,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn field_errors(&self) -> Value {
        match self {
            Error::Validation { field, detail } => json!({ *field: detail }),
            Error::DuplicateEmail => json!({ "email": self.to_string() }),
            Error::InvalidCredentials | Error::AccountDisabled => {
                json!({ "detail": self.to_string() })
            }
            Error::TokenInvalid => json!({ "detail": self.to_string() }),
            Error::ProviderTokenInvalid { detail } => json!({ "access_token": detail }),
            Error::LastAuthMethod => {
                json!({ "provider": "Cannot disconnect the only login method" })
            }
            Error::IdentityNotFound(provider) => {
                json!({ "provider": format!("{} account not found", provider) })
            }
            Error::InvalidOldPassword => {
                json!({ "old_password": "The password you entered is incorrect" })
            }
            Error::PasswordMismatch { field } => json!({ *field: self.to_string() }),
            Error::WeakPassword { field, detail } => json!({ *field: detail }),
            Error::InvalidResetToken | Error::InvalidVerificationToken => {
                json!({ "token": self.to_string() })
            }
            Error::Unauthorized | Error::NotFound => json!({ "detail": self.to_string() }),
            Error::Database(_) | Error::Internal(_) => {
                json!({ "detail": "An unexpected error occurred" })
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        // 5xx details stay in the log, never in the envelope.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "unhandled error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorBody {
            message,
            errors: self.field_errors(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sea_orm::TransactionError<Error>> for Error {
    fn from(err: sea_orm::TransactionError<Error>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(inner) => Error::Database(inner),
            sea_orm::TransactionError::Transaction(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn envelope_carries_message_and_field_errors() {
        let response = Error::DuplicateEmail.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["message"], "A user with this email already exists.");
        assert_eq!(body["errors"]["email"], "A user with this email already exists.");
    }

    #[tokio::test]
    async fn server_errors_never_leak_internals() {
        let response =
            Error::Internal("connection pool exhausted on shard 7".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["errors"]["detail"], "An unexpected error occurred");
    }

    #[test]
    fn token_failures_map_to_401() {
        assert_eq!(Error::TokenInvalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unknown_identity_maps_to_404() {
        assert_eq!(
            Error::IdentityNotFound("github".to_string()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
