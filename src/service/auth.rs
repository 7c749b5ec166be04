use argon2::{password_hash::PasswordHash, Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::Set;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::accounts,
    error::Error,
    repo::accounts::AccountsRepo,
    service::verification::{TokenPurpose, VerificationService},
};

pub(crate) fn normalize_email(email: &str) -> Result<String, Error> {
    let value = email.trim().to_lowercase();
    if value.is_empty() || !value.contains('@') {
        return Err(Error::validation("email", "Enter a valid email address."));
    }
    Ok(value)
}

pub(crate) fn validate_password_strength(password: &str, field: &'static str) -> Result<(), Error> {
    if password.len() < 8 {
        return Err(Error::WeakPassword {
            field,
            detail: "password must be at least 8 characters".to_string(),
        });
    }
    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;
    for ch in password.chars() {
        if ch.is_ascii_uppercase() {
            has_upper = true;
        } else if ch.is_ascii_lowercase() {
            has_lower = true;
        } else if ch.is_ascii_digit() {
            has_digit = true;
        } else {
            has_special = true;
        }
    }
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(Error::WeakPassword {
            field,
            detail: "password must include upper, lower, digit, and special character".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> Result<String, Error> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = argon2::password_hash::SaltString::encode_b64(&salt)
        .map_err(|err| Error::Internal(format!("password hash failed: {}", err)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| Error::Internal(format!("password hash failed: {}", err)))?
        .to_string();
    Ok(hash)
}

pub(crate) fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Local handle from the email local-part; callers add a numeric suffix on
/// collision.
pub(crate) fn handle_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email).trim();
    if local.is_empty() {
        "user".to_string()
    } else {
        local.to_lowercase()
    }
}

pub(crate) async fn unique_username(
    repo: &dyn AccountsRepo,
    email: &str,
) -> Result<String, Error> {
    let base = handle_from_email(email);
    let mut candidate = base.clone();
    let mut counter = 1;
    while repo.find_by_username(&candidate).await?.is_some() {
        candidate = format!("{}{}", base, counter);
        counter += 1;
    }
    Ok(candidate)
}

pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    /// Acting caller for admin-created accounts; None for self-registration.
    pub created_by: Option<Uuid>,
}

#[derive(Debug)]
pub struct RegisterOutput {
    pub account: accounts::Model,
    pub verify_token: String,
    pub verify_expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, Error>;
    /// Uniform `InvalidCredentials` whether the email is unknown or the
    /// password is wrong; `AccountDisabled` only after the password matched.
    async fn login(&self, email: &str, password: &str) -> Result<accounts::Model, Error>;
}

pub struct AuthServiceImpl {
    accounts_repo: Arc<dyn AccountsRepo>,
    verification: Arc<dyn VerificationService>,
}

impl AuthServiceImpl {
    pub fn new(
        accounts_repo: Arc<dyn AccountsRepo>,
        verification: Arc<dyn VerificationService>,
    ) -> Self {
        Self {
            accounts_repo,
            verification,
        }
    }

}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, Error> {
        let email = normalize_email(&input.email)?;
        if input.password != input.password2 {
            return Err(Error::PasswordMismatch { field: "password" });
        }
        validate_password_strength(&input.password, "password")?;

        if self.accounts_repo.find_by_email(&email).await?.is_some() {
            return Err(Error::DuplicateEmail);
        }

        let username = unique_username(self.accounts_repo.as_ref(), &email).await?;
        let password_hash = hash_password(&input.password)?;

        let account = self
            .accounts_repo
            .insert(accounts::ActiveModel {
                uid: Set(Uuid::new_v4()),
                email: Set(email.clone()),
                password_hash: Set(Some(password_hash)),
                username: Set(Some(username)),
                first_name: Set(input.first_name),
                last_name: Set(input.last_name),
                phone: Set(input.phone),
                created_by: Set(input.created_by),
                updated_by: Set(input.created_by),
                ..Default::default()
            })
            .await?;

        let verification = self
            .verification
            .issue(account.id, TokenPurpose::VerifyEmail)
            .await?;

        tracing::info!(email = %account.email, uid = %account.uid, "account registered");

        Ok(RegisterOutput {
            account,
            verify_token: verification.token,
            verify_expires_at: verification.expires_at,
        })
    }

    async fn login(&self, email: &str, password: &str) -> Result<accounts::Model, Error> {
        let normalized = email.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let Some(account) = self.accounts_repo.find_by_email(&normalized).await? else {
            return Err(Error::InvalidCredentials);
        };

        let Some(hash) = account.password_hash.as_deref() else {
            return Err(Error::InvalidCredentials);
        };
        if !verify_password(hash, password) {
            return Err(Error::InvalidCredentials);
        }

        if !account.is_active {
            return Err(Error::AccountDisabled);
        }

        tracing::info!(email = %account.email, uid = %account.uid, "login");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repo::accounts::MockAccountsRepo,
        service::verification::{IssuedToken, MockVerificationService},
    };

    fn inserted(model: accounts::ActiveModel) -> accounts::Model {
        accounts::Model {
            id: 1,
            uid: model.uid.unwrap(),
            email: model.email.unwrap(),
            password_hash: model.password_hash.unwrap(),
            username: model.username.unwrap(),
            first_name: model.first_name.unwrap(),
            last_name: model.last_name.unwrap(),
            phone: model.phone.unwrap(),
            bio: None,
            avatar: None,
            email_verified_at: None,
            is_active: true,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            deleted_at: None,
            created_by: model.created_by.unwrap(),
            updated_by: model.updated_by.unwrap(),
            deleted_by: None,
        }
    }

    fn existing(email: &str, password: Option<&str>, is_active: bool) -> accounts::Model {
        accounts::Model {
            id: 1,
            uid: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password.map(|p| hash_password(p).expect("hash")),
            username: Some("a".to_string()),
            first_name: None,
            last_name: None,
            phone: None,
            bio: None,
            avatar: None,
            email_verified_at: None,
            is_active,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            deleted_at: None,
            created_by: None,
            updated_by: None,
            deleted_by: None,
        }
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "Aa1!aaaa".to_string(),
            password2: "Aa1!aaaa".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            created_by: None,
        }
    }

    fn mock_verification() -> MockVerificationService {
        let mut verification = MockVerificationService::new();
        verification.expect_issue().returning(|_, _| {
            Ok(IssuedToken {
                token: "tok".to_string(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
        });
        verification
    }

    #[test]
    fn password_policy_rejects_weak_passwords() {
        assert!(validate_password_strength("Aa1!aaaa", "password").is_ok());
        for weak in ["short1!", "alllower1!", "ALLUPPER1!", "NoDigits!!", "NoSpecial1a"] {
            assert!(
                matches!(
                    validate_password_strength(weak, "password"),
                    Err(Error::WeakPassword { .. })
                ),
                "expected {:?} to be rejected",
                weak
            );
        }
    }

    #[test]
    fn email_is_case_normalized() {
        assert_eq!(normalize_email("  A@X.Com ").expect("valid"), "a@x.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("   ").is_err());
    }

    #[test]
    fn handle_comes_from_local_part() {
        assert_eq!(handle_from_email("alice@example.com"), "alice");
        assert_eq!(handle_from_email("Bob.Smith@x.com"), "bob.smith");
    }

    #[test]
    fn hash_roundtrip() {
        let hash = hash_password("Aa1!aaaa").expect("hash");
        assert!(verify_password(&hash, "Aa1!aaaa"));
        assert!(!verify_password(&hash, "Aa1!aaab"));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let mut accounts_repo = MockAccountsRepo::new();
        accounts_repo
            .expect_find_by_email()
            .returning(|email| Ok(Some(existing(email, Some("Aa1!aaaa"), true))));
        let service = AuthServiceImpl::new(Arc::new(accounts_repo), Arc::new(mock_verification()));

        let err = service
            .register(register_input("a@x.com"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::DuplicateEmail));
    }

    #[tokio::test]
    async fn register_appends_suffix_on_username_collision() {
        let mut accounts_repo = MockAccountsRepo::new();
        accounts_repo.expect_find_by_email().returning(|_| Ok(None));
        accounts_repo
            .expect_find_by_username()
            .returning(|username| {
                if username == "alice" {
                    Ok(Some(existing("other@x.com", None, true)))
                } else {
                    Ok(None)
                }
            });
        accounts_repo
            .expect_insert()
            .returning(|model| Ok(inserted(model)));
        let service = AuthServiceImpl::new(Arc::new(accounts_repo), Arc::new(mock_verification()));

        let output = service
            .register(register_input("alice@x.com"))
            .await
            .expect("register");
        assert_eq!(output.account.username.as_deref(), Some("alice1"));
        assert_eq!(output.verify_token, "tok");
    }

    #[tokio::test]
    async fn register_rejects_password_mismatch_before_touching_storage() {
        let accounts_repo = MockAccountsRepo::new();
        let service = AuthServiceImpl::new(
            Arc::new(accounts_repo),
            Arc::new(MockVerificationService::new()),
        );

        let mut input = register_input("a@x.com");
        input.password2 = "Different1!".to_string();
        assert!(matches!(
            service.register(input).await,
            Err(Error::PasswordMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn login_failure_is_uniform_for_unknown_email_and_wrong_password() {
        let mut unknown_repo = MockAccountsRepo::new();
        unknown_repo.expect_find_by_email().returning(|_| Ok(None));
        let unknown = AuthServiceImpl::new(
            Arc::new(unknown_repo),
            Arc::new(MockVerificationService::new()),
        );

        let mut wrong_repo = MockAccountsRepo::new();
        wrong_repo
            .expect_find_by_email()
            .returning(|email| Ok(Some(existing(email, Some("Right1!aa"), true))));
        let wrong = AuthServiceImpl::new(
            Arc::new(wrong_repo),
            Arc::new(MockVerificationService::new()),
        );

        let a = unknown.login("ghost@x.com", "whatever").await;
        let b = wrong.login("a@x.com", "Wrong1!aa").await;
        assert!(matches!(a, Err(Error::InvalidCredentials)));
        assert!(matches!(b, Err(Error::InvalidCredentials)));
    }

    #[tokio::test]
    async fn login_with_social_only_account_fails_uniformly() {
        let mut repo = MockAccountsRepo::new();
        repo.expect_find_by_email()
            .returning(|email| Ok(Some(existing(email, None, true))));
        let service =
            AuthServiceImpl::new(Arc::new(repo), Arc::new(MockVerificationService::new()));

        assert!(matches!(
            service.login("a@x.com", "anything").await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn login_with_disabled_account_is_distinguished() {
        let mut repo = MockAccountsRepo::new();
        repo.expect_find_by_email()
            .returning(|email| Ok(Some(existing(email, Some("Right1!aa"), false))));
        let service =
            AuthServiceImpl::new(Arc::new(repo), Arc::new(MockVerificationService::new()));

        assert!(matches!(
            service.login("a@x.com", "Right1!aa").await,
            Err(Error::AccountDisabled)
        ));
    }
}
