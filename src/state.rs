use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    repo::{
        accounts::SeaOrmAccountsRepo, one_time_tokens::SeaOrmOneTimeTokensRepo,
        refresh_tokens::SeaOrmRefreshTokensRepo, social_accounts::SeaOrmSocialAccountsRepo,
    },
    service::{
        accounts::{AccountsService, AccountsServiceImpl},
        auth::{AuthService, AuthServiceImpl},
        config::{ConfigService, ConfigServiceImpl},
        passwords::{PasswordService, PasswordServiceImpl},
        social::{HttpProviderVerifier, SocialService, SocialServiceImpl},
        tokens::{JwtTokenService, TokenService},
        verification::{VerificationService, VerificationServiceImpl},
    },
};

pub trait DatabaseClient: Send + Sync {
    fn conn(&self) -> &DatabaseConnection;
}

pub struct SeaOrmDatabaseClient {
    conn: DatabaseConnection,
}

impl SeaOrmDatabaseClient {
    pub async fn new() -> Self {
        let conn = crate::db::connect()
            .await
            .expect("database connection failed");
        crate::schema::apply(&conn)
            .await
            .expect("schema apply failed");
        Self { conn }
    }
}

impl DatabaseClient for SeaOrmDatabaseClient {
    fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

pub struct AppState {
    accounts: Arc<dyn AccountsService>,
    auth: Arc<dyn AuthService>,
    tokens: Arc<dyn TokenService>,
    passwords: Arc<dyn PasswordService>,
    social: Arc<dyn SocialService>,
    verification: Arc<dyn VerificationService>,
    config: Arc<dyn ConfigService>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Arc::new(ConfigServiceImpl::new());
        let cfg = config.values().clone();

        let db: Arc<dyn DatabaseClient> = Arc::new(SeaOrmDatabaseClient::new().await);
        let accounts_repo = Arc::new(SeaOrmAccountsRepo::new(db.clone()));
        let social_repo = Arc::new(SeaOrmSocialAccountsRepo::new(db.clone()));
        let refresh_repo = Arc::new(SeaOrmRefreshTokensRepo::new(db.clone()));
        let one_time_repo = Arc::new(SeaOrmOneTimeTokensRepo::new(db.clone()));

        let verification = Arc::new(VerificationServiceImpl::new(
            one_time_repo,
            cfg.verify_email_token_ttl_seconds,
            cfg.reset_token_ttl_seconds,
        ));
        let tokens = Arc::new(JwtTokenService::new(
            cfg.jwt_secret.as_bytes(),
            cfg.access_token_ttl_seconds,
            cfg.refresh_token_ttl_seconds,
            cfg.rotate_refresh_tokens,
            refresh_repo,
        ));
        let auth = Arc::new(AuthServiceImpl::new(
            accounts_repo.clone(),
            verification.clone(),
        ));
        let passwords = Arc::new(PasswordServiceImpl::new(
            accounts_repo.clone(),
            verification.clone(),
        ));
        let verifier = Arc::new(HttpProviderVerifier::new(&cfg));
        let social = Arc::new(SocialServiceImpl::new(
            db,
            accounts_repo.clone(),
            social_repo.clone(),
            verifier,
        ));
        let accounts = Arc::new(AccountsServiceImpl::new(accounts_repo, social_repo));

        Arc::new(Self {
            accounts,
            auth,
            tokens,
            passwords,
            social,
            verification,
            config,
        })
    }

    pub fn accounts(&self) -> &dyn AccountsService {
        self.accounts.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthService {
        self.auth.as_ref()
    }

    pub fn tokens(&self) -> &dyn TokenService {
        self.tokens.as_ref()
    }

    pub fn passwords(&self) -> &dyn PasswordService {
        self.passwords.as_ref()
    }

    pub fn social(&self) -> &dyn SocialService {
        self.social.as_ref()
    }

    pub fn verification(&self) -> &dyn VerificationService {
        self.verification.as_ref()
    }

    pub fn config(&self) -> &dyn ConfigService {
        self.config.as_ref()
    }
}
