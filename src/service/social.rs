use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{AccessMode, IsolationLevel, Set, TransactionTrait};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::Config,
    entities::{accounts, social_accounts},
    error::Error,
    repo::{accounts::AccountsRepo, social_accounts::SocialAccountsRepo},
    service::auth::{normalize_email, unique_username},
    state::DatabaseClient,
};

pub const SUPPORTED_PROVIDERS: &[&str] = &["google", "facebook", "github"];

#[derive(Clone, Debug)]
pub struct ProviderProfile {
    pub provider_uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Exchanges a provider-issued access token for the provider's view of the
/// user, against that provider's verification endpoint.
#[async_trait]
pub trait ProviderVerifier: Send + Sync {
    async fn verify(&self, provider: &str, access_token: &str) -> Result<ProviderProfile, Error>;
}

pub struct HttpProviderVerifier {
    client: reqwest::Client,
    google_api_base: String,
    facebook_api_base: String,
    github_api_base: String,
}

#[derive(serde::Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(serde::Deserialize)]
struct FacebookUser {
    id: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(serde::Deserialize)]
struct GithubUser {
    id: u64,
    name: Option<String>,
    email: Option<String>,
}

#[derive(serde::Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl HttpProviderVerifier {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.provider_timeout_seconds))
            .build()
            .expect("provider http client");
        Self {
            client,
            google_api_base: config.google_api_base.clone(),
            facebook_api_base: config.facebook_api_base.clone(),
            github_api_base: config.github_api_base.clone(),
        }
    }

    fn exchange_failed(provider: &str, detail: impl std::fmt::Display) -> Error {
        Error::ProviderTokenInvalid {
            detail: format!("{} token verification failed: {}", provider, detail),
        }
    }

    async fn fetch_google(&self, access_token: &str) -> Result<ProviderProfile, Error> {
        let url = format!(
            "{}/oauth2/v3/userinfo",
            self.google_api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| Self::exchange_failed("google", err))?;
        if !response.status().is_success() {
            return Err(Self::exchange_failed("google", response.status()));
        }
        let user: GoogleUserInfo = response
            .json()
            .await
            .map_err(|err| Self::exchange_failed("google", err))?;
        Ok(ProviderProfile {
            provider_uid: user.sub,
            email: user.email,
            name: user.name,
        })
    }

    async fn fetch_facebook(&self, access_token: &str) -> Result<ProviderProfile, Error> {
        let url = format!(
            "{}/me?fields=id,name,email&access_token={}",
            self.facebook_api_base.trim_end_matches('/'),
            urlencoding::encode(access_token)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| Self::exchange_failed("facebook", err))?;
        if !response.status().is_success() {
            return Err(Self::exchange_failed("facebook", response.status()));
        }
        let user: FacebookUser = response
            .json()
            .await
            .map_err(|err| Self::exchange_failed("facebook", err))?;
        Ok(ProviderProfile {
            provider_uid: user.id,
            email: user.email,
            name: user.name,
        })
    }

    async fn fetch_github(&self, access_token: &str) -> Result<ProviderProfile, Error> {
        let base = self.github_api_base.trim_end_matches('/');
        let response = self
            .client
            .get(format!("{}/user", base))
            .bearer_auth(access_token)
            .header("User-Agent", "account-api")
            .send()
            .await
            .map_err(|err| Self::exchange_failed("github", err))?;
        if !response.status().is_success() {
            return Err(Self::exchange_failed("github", response.status()));
        }
        let user: GithubUser = response
            .json()
            .await
            .map_err(|err| Self::exchange_failed("github", err))?;

        let mut email = user.email;
        if email.is_none() {
            // Address is private on the profile; ask the emails endpoint.
            let response = self
                .client
                .get(format!("{}/user/emails", base))
                .bearer_auth(access_token)
                .header("User-Agent", "account-api")
                .send()
                .await
                .map_err(|err| Self::exchange_failed("github", err))?;
            if response.status().is_success() {
                let emails: Vec<GithubEmail> = response
                    .json()
                    .await
                    .map_err(|err| Self::exchange_failed("github", err))?;
                email = emails
                    .iter()
                    .find(|entry| entry.primary && entry.verified)
                    .or_else(|| emails.first())
                    .map(|entry| entry.email.clone());
            }
        }

        Ok(ProviderProfile {
            provider_uid: user.id.to_string(),
            email,
            name: user.name,
        })
    }
}

#[async_trait]
impl ProviderVerifier for HttpProviderVerifier {
    async fn verify(&self, provider: &str, access_token: &str) -> Result<ProviderProfile, Error> {
        match provider {
            "google" => self.fetch_google(access_token).await,
            "facebook" => self.fetch_facebook(access_token).await,
            "github" => self.fetch_github(access_token).await,
            other => Err(Error::validation(
                "provider",
                format!("unsupported provider: {}", other),
            )),
        }
    }
}

#[async_trait]
pub trait SocialService: Send + Sync {
    /// Resolve-or-create the local account for a verified provider identity
    /// and return it; token issuance happens at the handler.
    async fn login_with_provider(
        &self,
        provider: &str,
        access_token: &str,
    ) -> Result<accounts::Model, Error>;
    async fn list(&self, account: &accounts::Model)
        -> Result<Vec<social_accounts::Model>, Error>;
    /// Delete one linked identity, refusing to remove the last usable auth
    /// method. Check and delete run in one serializable transaction.
    async fn disconnect(&self, account: &accounts::Model, provider: &str) -> Result<(), Error>;
}

pub struct SocialServiceImpl {
    db: Arc<dyn DatabaseClient>,
    accounts_repo: Arc<dyn AccountsRepo>,
    social_repo: Arc<dyn SocialAccountsRepo>,
    verifier: Arc<dyn ProviderVerifier>,
}

impl SocialServiceImpl {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        accounts_repo: Arc<dyn AccountsRepo>,
        social_repo: Arc<dyn SocialAccountsRepo>,
        verifier: Arc<dyn ProviderVerifier>,
    ) -> Self {
        Self {
            db,
            accounts_repo,
            social_repo,
            verifier,
        }
    }

    fn split_name(name: Option<String>) -> (Option<String>, Option<String>) {
        let Some(name) = name else {
            return (None, None);
        };
        let name = name.trim();
        if name.is_empty() {
            return (None, None);
        }
        match name.split_once(' ') {
            Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
            None => (Some(name.to_string()), None),
        }
    }
}

#[async_trait]
impl SocialService for SocialServiceImpl {
    async fn login_with_provider(
        &self,
        provider: &str,
        access_token: &str,
    ) -> Result<accounts::Model, Error> {
        let provider = provider.trim().to_ascii_lowercase();
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            return Err(Error::validation(
                "provider",
                format!("unsupported provider: {}", provider),
            ));
        }

        let profile = self.verifier.verify(&provider, access_token).await?;

        // Normalize the email and pre-compute a free handle outside the
        // transaction; the unique indexes stay the backstop for races.
        let email = match &profile.email {
            Some(email) => Some(normalize_email(email).map_err(|_| {
                Error::ProviderTokenInvalid {
                    detail: format!("{} returned an invalid email address", provider),
                }
            })?),
            None => None,
        };
        let username = match &email {
            Some(email) => Some(unique_username(self.accounts_repo.as_ref(), email).await?),
            None => None,
        };

        let accounts_repo = self.accounts_repo.clone();
        let social_repo = self.social_repo.clone();
        let txn_provider = provider.clone();
        let account = self
            .db
            .conn()
            .transaction::<_, accounts::Model, Error>(|txn| {
                let accounts_repo = accounts_repo.clone();
                let social_repo = social_repo.clone();
                let provider = txn_provider.clone();
                let profile = profile.clone();
                let email = email.clone();
                let username = username.clone();
                Box::pin(async move {
                    if let Some(identity) = social_repo
                        .find_by_provider_uid_with_txn(txn, &provider, &profile.provider_uid)
                        .await?
                    {
                        return accounts_repo
                            .find_by_id_with_txn(txn, identity.account_id)
                            .await?
                            .ok_or_else(|| Error::ProviderTokenInvalid {
                                detail: "linked account no longer exists".to_string(),
                            });
                    }

                    let Some(email) = email else {
                        return Err(Error::ProviderTokenInvalid {
                            detail: format!("{} did not supply an email address", provider),
                        });
                    };

                    if let Some(account) =
                        accounts_repo.find_by_email_with_txn(txn, &email).await?
                    {
                        // Account linking: same email, first login through
                        // this provider.
                        social_repo
                            .insert_with_txn(
                                txn,
                                social_accounts::ActiveModel {
                                    account_id: Set(account.id),
                                    provider: Set(provider.clone()),
                                    provider_uid: Set(profile.provider_uid.clone()),
                                    email: Set(Some(email.clone())),
                                    ..Default::default()
                                },
                            )
                            .await?;
                        return Ok(account);
                    }

                    // Auto-signup: the provider already verified the address.
                    let (first_name, last_name) = Self::split_name(profile.name.clone());
                    let account = accounts_repo
                        .insert_with_txn(
                            txn,
                            accounts::ActiveModel {
                                uid: Set(Uuid::new_v4()),
                                email: Set(email.clone()),
                                password_hash: Set(None),
                                username: Set(username.clone()),
                                first_name: Set(first_name),
                                last_name: Set(last_name),
                                email_verified_at: Set(Some(Utc::now().into())),
                                ..Default::default()
                            },
                        )
                        .await?;
                    social_repo
                        .insert_with_txn(
                            txn,
                            social_accounts::ActiveModel {
                                account_id: Set(account.id),
                                provider: Set(provider.clone()),
                                provider_uid: Set(profile.provider_uid.clone()),
                                email: Set(Some(email)),
                                ..Default::default()
                            },
                        )
                        .await?;
                    Ok(account)
                })
            })
            .await
            .map_err(Error::from)?;

        if !account.is_active {
            return Err(Error::AccountDisabled);
        }

        tracing::info!(provider = %provider, email = %account.email, uid = %account.uid, "social login");
        Ok(account)
    }

    async fn list(
        &self,
        account: &accounts::Model,
    ) -> Result<Vec<social_accounts::Model>, Error> {
        Ok(self.social_repo.list_by_account(account.id).await?)
    }

    async fn disconnect(&self, account: &accounts::Model, provider: &str) -> Result<(), Error> {
        let provider = provider.trim().to_ascii_lowercase();
        let accounts_repo = self.accounts_repo.clone();
        let social_repo = self.social_repo.clone();
        let account_id = account.id;
        let txn_provider = provider.clone();

        self.db
            .conn()
            .transaction_with_config::<_, (), Error>(
                |txn| {
                    let accounts_repo = accounts_repo.clone();
                    let social_repo = social_repo.clone();
                    let provider = txn_provider.clone();
                    Box::pin(async move {
                        // Re-read inside the transaction: the password check
                        // and the count must see one consistent snapshot.
                        let account = accounts_repo
                            .find_by_id_with_txn(txn, account_id)
                            .await?
                            .ok_or(Error::Unauthorized)?;

                        let count =
                            social_repo.count_by_account_with_txn(txn, account.id).await?;
                        if count == 1 && !account.has_usable_password() {
                            return Err(Error::LastAuthMethod);
                        }

                        let Some(identity) = social_repo
                            .find_by_account_and_provider_with_txn(txn, account.id, &provider)
                            .await?
                        else {
                            return Err(Error::IdentityNotFound(provider.clone()));
                        };

                        social_repo.delete_by_id_with_txn(txn, identity.id).await?;
                        Ok(())
                    })
                },
                Some(IsolationLevel::Serializable),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(Error::from)?;

        tracing::info!(provider = %provider, email = %account.email, uid = %account.uid, "social account disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_handles_missing_and_single_names() {
        assert_eq!(SocialServiceImpl::split_name(None), (None, None));
        assert_eq!(
            SocialServiceImpl::split_name(Some("  ".to_string())),
            (None, None)
        );
        assert_eq!(
            SocialServiceImpl::split_name(Some("Ada".to_string())),
            (Some("Ada".to_string()), None)
        );
        assert_eq!(
            SocialServiceImpl::split_name(Some("Ada Lovelace King".to_string())),
            (Some("Ada".to_string()), Some("Lovelace King".to_string()))
        );
    }

    // End-to-end linking and the disconnect invariant run against a real
    // database; enable with DATABASE_URL.
    mod db {
        use super::*;
        use crate::repo::{
            accounts::SeaOrmAccountsRepo, social_accounts::SeaOrmSocialAccountsRepo,
        };
        use crate::service::auth::hash_password;
        use sea_orm::Database;

        struct TestDatabaseClient {
            conn: sea_orm::DatabaseConnection,
        }

        impl DatabaseClient for TestDatabaseClient {
            fn conn(&self) -> &sea_orm::DatabaseConnection {
                &self.conn
            }
        }

        struct StaticVerifier {
            profile: ProviderProfile,
        }

        #[async_trait]
        impl ProviderVerifier for StaticVerifier {
            async fn verify(
                &self,
                _provider: &str,
                _access_token: &str,
            ) -> Result<ProviderProfile, Error> {
                Ok(self.profile.clone())
            }
        }

        async fn connect() -> Option<Arc<TestDatabaseClient>> {
            let database_url = match std::env::var("DATABASE_URL") {
                Ok(value) if !value.trim().is_empty() => value,
                _ => return None,
            };
            let conn = Database::connect(&database_url).await.expect("connect");
            crate::schema::apply(&conn).await.expect("schema");
            Some(Arc::new(TestDatabaseClient { conn }))
        }

        fn service(db: Arc<TestDatabaseClient>, profile: ProviderProfile) -> SocialServiceImpl {
            let accounts_repo = Arc::new(SeaOrmAccountsRepo::new(db.clone()));
            let social_repo = Arc::new(SeaOrmSocialAccountsRepo::new(db.clone()));
            SocialServiceImpl::new(
                db,
                accounts_repo,
                social_repo,
                Arc::new(StaticVerifier { profile }),
            )
        }

        #[tokio::test]
        #[ignore]
        async fn disconnect_refuses_to_remove_last_auth_method() {
            let Some(db) = connect().await else { return };
            let suffix = Uuid::new_v4().simple().to_string();
            let profile = ProviderProfile {
                provider_uid: format!("uid-{}", suffix),
                email: Some(format!("social-{}@example.com", suffix)),
                name: Some("Social Only".to_string()),
            };
            let service = service(db.clone(), profile);

            // Auto-signup leaves the account with no password and one
            // identity.
            let account = service
                .login_with_provider("github", "token")
                .await
                .expect("social login");
            assert!(!account.has_usable_password());

            let err = service
                .disconnect(&account, "github")
                .await
                .expect_err("must refuse");
            assert!(matches!(err, Error::LastAuthMethod));

            // With a usable password the same disconnect goes through.
            let accounts_repo = SeaOrmAccountsRepo::new(db.clone());
            let mut active: accounts::ActiveModel = account.clone().into();
            active.password_hash = Set(Some(hash_password("Aa1!aaaa").expect("hash")));
            let account = accounts_repo.update(active).await.expect("update");

            service
                .disconnect(&account, "github")
                .await
                .expect("disconnect");

            let err = service
                .disconnect(&account, "github")
                .await
                .expect_err("nothing left to disconnect");
            assert!(matches!(err, Error::IdentityNotFound(_)));
        }

        #[tokio::test]
        #[ignore]
        async fn repeated_social_login_resolves_the_same_account() {
            let Some(db) = connect().await else { return };
            let suffix = Uuid::new_v4().simple().to_string();
            let profile = ProviderProfile {
                provider_uid: format!("uid-{}", suffix),
                email: Some(format!("repeat-{}@example.com", suffix)),
                name: None,
            };
            let service = service(db, profile);

            let first = service
                .login_with_provider("google", "token")
                .await
                .expect("first login");
            let second = service
                .login_with_provider("google", "token")
                .await
                .expect("second login");
            assert_eq!(first.id, second.id);
        }
    }
}
