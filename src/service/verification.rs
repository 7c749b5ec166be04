use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sea_orm::Set;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::{entities::one_time_tokens, error::Error, repo::one_time_tokens::OneTimeTokensRepo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::VerifyEmail => "verify_email",
            TokenPurpose::ResetPassword => "reset_password",
        }
    }

    fn invalid(&self) -> Error {
        match self {
            TokenPurpose::VerifyEmail => Error::InvalidVerificationToken,
            TokenPurpose::ResetPassword => Error::InvalidResetToken,
        }
    }
}

#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and redeems the single-use tokens behind email verification and
/// password reset. Only SHA-256 digests hit storage; the opaque token goes
/// out by email and is never persisted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Create a token for (account, purpose), superseding any outstanding one.
    async fn issue(&self, account_id: i64, purpose: TokenPurpose) -> Result<IssuedToken, Error>;
    /// Resolve a live token without consuming it.
    async fn peek(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<one_time_tokens::Model, Error>;
    /// Redeem a token; fails if it is unknown, expired, or already consumed.
    async fn consume(&self, token: &str, purpose: TokenPurpose) -> Result<i64, Error>;
    /// Consume a previously peeked token by row id (compare-and-consume).
    async fn consume_by_id(&self, id: i64, purpose: TokenPurpose) -> Result<(), Error>;
}

pub struct VerificationServiceImpl {
    tokens_repo: Arc<dyn OneTimeTokensRepo>,
    verify_ttl_seconds: u64,
    reset_ttl_seconds: u64,
}

impl VerificationServiceImpl {
    pub fn new(
        tokens_repo: Arc<dyn OneTimeTokensRepo>,
        verify_ttl_seconds: u64,
        reset_ttl_seconds: u64,
    ) -> Self {
        Self {
            tokens_repo,
            verify_ttl_seconds,
            reset_ttl_seconds,
        }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub(crate) fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn ttl(&self, purpose: TokenPurpose) -> Duration {
        let seconds = match purpose {
            TokenPurpose::VerifyEmail => self.verify_ttl_seconds,
            TokenPurpose::ResetPassword => self.reset_ttl_seconds,
        };
        Duration::seconds(seconds as i64)
    }
}

#[async_trait]
impl VerificationService for VerificationServiceImpl {
    async fn issue(&self, account_id: i64, purpose: TokenPurpose) -> Result<IssuedToken, Error> {
        let token = Self::generate_token();
        let token_hash = Self::hash_token(&token);
        let expires_at = Utc::now() + self.ttl(purpose);

        // One live token per (account, purpose): a reissue supersedes the old
        // one by consuming it.
        if let Some(existing) = self
            .tokens_repo
            .find_active_by_account_and_purpose(account_id, purpose.as_str())
            .await?
        {
            self.tokens_repo.consume_by_id(existing.id).await?;
        }

        self.tokens_repo
            .insert(one_time_tokens::ActiveModel {
                account_id: Set(account_id),
                token_hash: Set(token_hash),
                purpose: Set(purpose.as_str().to_string()),
                expires_at: Set(expires_at.into()),
                consumed_at: Set(None),
                ..Default::default()
            })
            .await?;

        Ok(IssuedToken { token, expires_at })
    }

    async fn peek(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<one_time_tokens::Model, Error> {
        let token_hash = Self::hash_token(token);
        let record = self
            .tokens_repo
            .find_active_by_hash(&token_hash)
            .await?
            .ok_or_else(|| purpose.invalid())?;
        if record.purpose != purpose.as_str() {
            return Err(purpose.invalid());
        }
        Ok(record)
    }

    async fn consume(&self, token: &str, purpose: TokenPurpose) -> Result<i64, Error> {
        let record = self.peek(token, purpose).await?;
        self.consume_by_id(record.id, purpose).await?;
        Ok(record.account_id)
    }

    async fn consume_by_id(&self, id: i64, purpose: TokenPurpose) -> Result<(), Error> {
        if !self.tokens_repo.consume_by_id(id).await? {
            return Err(purpose.invalid());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::one_time_tokens::MockOneTimeTokensRepo;

    fn row(id: i64, account_id: i64, purpose: TokenPurpose, token: &str) -> one_time_tokens::Model {
        one_time_tokens::Model {
            id,
            account_id,
            token_hash: VerificationServiceImpl::hash_token(token),
            purpose: purpose.as_str().to_string(),
            expires_at: (Utc::now() + Duration::hours(1)).into(),
            consumed_at: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn token_hash_is_deterministic_and_opaque() {
        let a = VerificationServiceImpl::hash_token("abc");
        let b = VerificationServiceImpl::hash_token("abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, VerificationServiceImpl::hash_token("abd"));
    }

    #[tokio::test]
    async fn issue_supersedes_outstanding_token() {
        let mut repo = MockOneTimeTokensRepo::new();
        repo.expect_find_active_by_account_and_purpose()
            .returning(|account_id, _| Ok(Some(row(3, account_id, TokenPurpose::VerifyEmail, "old"))));
        repo.expect_consume_by_id().returning(|id| {
            assert_eq!(id, 3);
            Ok(true)
        });
        repo.expect_insert().returning(|model| {
            Ok(one_time_tokens::Model {
                id: 4,
                account_id: model.account_id.unwrap(),
                token_hash: model.token_hash.unwrap(),
                purpose: model.purpose.unwrap(),
                expires_at: model.expires_at.unwrap(),
                consumed_at: None,
                created_at: Utc::now().into(),
            })
        });
        let service = VerificationServiceImpl::new(Arc::new(repo), 3600, 3600);

        let issued = service
            .issue(9, TokenPurpose::VerifyEmail)
            .await
            .expect("issue");
        assert!(!issued.token.is_empty());
        assert!(issued.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn consume_rejects_purpose_mismatch() {
        let mut repo = MockOneTimeTokensRepo::new();
        repo.expect_find_active_by_hash()
            .returning(|_| Ok(Some(row(1, 9, TokenPurpose::VerifyEmail, "tok"))));
        let service = VerificationServiceImpl::new(Arc::new(repo), 3600, 3600);

        let err = service
            .consume("tok", TokenPurpose::ResetPassword)
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidResetToken));
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let mut repo = MockOneTimeTokensRepo::new();
        repo.expect_find_active_by_hash()
            .returning(|_| Ok(Some(row(1, 9, TokenPurpose::ResetPassword, "tok"))));
        // Someone else consumed the row between lookup and redeem.
        repo.expect_consume_by_id().returning(|_| Ok(false));
        let service = VerificationServiceImpl::new(Arc::new(repo), 3600, 3600);

        let err = service
            .consume("tok", TokenPurpose::ResetPassword)
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::InvalidResetToken));
    }

    #[tokio::test]
    async fn unknown_token_maps_to_purpose_error() {
        let mut repo = MockOneTimeTokensRepo::new();
        repo.expect_find_active_by_hash().returning(|_| Ok(None));
        let service = VerificationServiceImpl::new(Arc::new(repo), 3600, 3600);

        assert!(matches!(
            service.consume("nope", TokenPurpose::VerifyEmail).await,
            Err(Error::InvalidVerificationToken)
        ));
    }
}
