use async_trait::async_trait;
use sea_orm::Set;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::accounts,
    error::Error,
    repo::accounts::AccountsRepo,
    service::auth::{hash_password, normalize_email, validate_password_strength, verify_password},
    service::verification::{IssuedToken, TokenPurpose, VerificationService},
};

pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

pub struct ResetRequest {
    pub account: accounts::Model,
    pub token: IssuedToken,
}

#[async_trait]
pub trait PasswordService: Send + Sync {
    /// Replace the stored hash after verifying the old password. Existing
    /// refresh tokens deliberately stay valid (ported behavior).
    async fn change(
        &self,
        account: &accounts::Model,
        input: ChangePasswordInput,
    ) -> Result<(), Error>;
    /// Returns None when no active account matches; callers report success
    /// either way to avoid account enumeration.
    async fn request_reset(&self, email: &str) -> Result<Option<ResetRequest>, Error>;
    async fn confirm_reset(
        &self,
        uid: Uuid,
        token: &str,
        new_password: &str,
        new_password2: &str,
    ) -> Result<(), Error>;
}

pub struct PasswordServiceImpl {
    accounts_repo: Arc<dyn AccountsRepo>,
    verification: Arc<dyn VerificationService>,
}

impl PasswordServiceImpl {
    pub fn new(
        accounts_repo: Arc<dyn AccountsRepo>,
        verification: Arc<dyn VerificationService>,
    ) -> Self {
        Self {
            accounts_repo,
            verification,
        }
    }

    async fn store_new_password(
        &self,
        account: &accounts::Model,
        new_password: &str,
    ) -> Result<(), Error> {
        let password_hash = hash_password(new_password)?;
        let mut active: accounts::ActiveModel = account.clone().into();
        active.password_hash = Set(Some(password_hash));
        active.updated_by = Set(Some(account.uid));
        self.accounts_repo.update(active).await?;
        Ok(())
    }
}

#[async_trait]
impl PasswordService for PasswordServiceImpl {
    async fn change(
        &self,
        account: &accounts::Model,
        input: ChangePasswordInput,
    ) -> Result<(), Error> {
        let old_matches = account
            .password_hash
            .as_deref()
            .map(|hash| verify_password(hash, &input.old_password))
            .unwrap_or(false);
        if !old_matches {
            return Err(Error::InvalidOldPassword);
        }

        if input.new_password != input.new_password2 {
            return Err(Error::PasswordMismatch {
                field: "new_password",
            });
        }
        validate_password_strength(&input.new_password, "new_password")?;

        self.store_new_password(account, &input.new_password).await?;
        tracing::info!(email = %account.email, uid = %account.uid, "password changed");
        Ok(())
    }

    async fn request_reset(&self, email: &str) -> Result<Option<ResetRequest>, Error> {
        let email = normalize_email(email)?;
        let Some(account) = self.accounts_repo.find_by_email(&email).await? else {
            return Ok(None);
        };
        if !account.is_active {
            return Ok(None);
        }

        let token = self
            .verification
            .issue(account.id, TokenPurpose::ResetPassword)
            .await?;
        tracing::info!(email = %account.email, uid = %account.uid, "password reset requested");
        Ok(Some(ResetRequest { account, token }))
    }

    async fn confirm_reset(
        &self,
        uid: Uuid,
        token: &str,
        new_password: &str,
        new_password2: &str,
    ) -> Result<(), Error> {
        let Some(account) = self.accounts_repo.find_by_uid(uid).await? else {
            return Err(Error::InvalidResetToken);
        };

        let record = self
            .verification
            .peek(token, TokenPurpose::ResetPassword)
            .await?;
        if record.account_id != account.id {
            return Err(Error::InvalidResetToken);
        }

        if new_password != new_password2 {
            return Err(Error::PasswordMismatch {
                field: "new_password",
            });
        }
        validate_password_strength(new_password, "new_password")?;

        // Consume only after validation so a mismatched confirmation does not
        // burn the token.
        self.verification
            .consume_by_id(record.id, TokenPurpose::ResetPassword)
            .await?;

        self.store_new_password(&account, new_password).await?;
        tracing::info!(email = %account.email, uid = %account.uid, "password reset confirmed");
        Ok(())
    }
}
