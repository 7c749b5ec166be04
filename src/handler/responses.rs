use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entities::social_accounts, service::accounts::Profile};

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SocialAccountResponse {
    pub provider: String,
    pub uid: String,
    pub email: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl From<social_accounts::Model> for SocialAccountResponse {
    fn from(model: social_accounts::Model) -> Self {
        Self {
            provider: model.provider,
            uid: model.provider_uid,
            email: model.email,
            connected_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub social_accounts: Vec<SocialAccountResponse>,
    pub created_by_email: Option<String>,
    pub updated_by_email: Option<String>,
}

impl From<Profile> for UserResponse {
    fn from(profile: Profile) -> Self {
        let account = profile.account;
        Self {
            id: account.uid,
            full_name: account.full_name(),
            email_verified: account.email_verified_at.is_some(),
            email: account.email,
            username: account.username,
            first_name: account.first_name,
            last_name: account.last_name,
            phone: account.phone,
            avatar: account.avatar,
            bio: account.bio,
            is_active: account.is_active,
            created_at: account.created_at.with_timezone(&Utc),
            updated_at: account.updated_at.with_timezone(&Utc),
            social_accounts: profile.identities.into_iter().map(Into::into).collect(),
            created_by_email: profile.created_by_email,
            updated_by_email: profile.updated_by_email,
        }
    }
}

/// Login/registration/social-login payload: the token pair plus the user.
#[derive(Serialize, ToSchema)]
pub struct AuthTokensResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserResponse,
}
