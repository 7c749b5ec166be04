use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{entities::accounts, error::Error, state::AppState};

/// Account behind the request's `Authorization: Bearer <access>` header.
/// Rejects with 401 on a missing/invalid token and 403 on a disabled account.
pub struct CurrentAccount(pub accounts::Model);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentAccount {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::Unauthorized)?;
        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(Error::Unauthorized)?;

        let claims = state.tokens().decode_access(token)?;
        let uid = Uuid::parse_str(&claims.sub).map_err(|_| Error::TokenInvalid)?;

        let account = state
            .accounts()
            .get_by_uid(uid)
            .await?
            .ok_or(Error::TokenInvalid)?;
        if !account.is_active {
            return Err(Error::AccountDisabled);
        }

        Ok(CurrentAccount(account))
    }
}
