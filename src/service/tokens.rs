use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::{accounts, refresh_tokens},
    error::Error,
    repo::refresh_tokens::RefreshTokensRepo,
};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Claims carried by both token kinds. `sub` is the account uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub token_type: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug)]
pub struct RefreshedTokens {
    pub access: String,
    /// Present only when rotation-on-use is enabled.
    pub refresh: Option<String>,
}

#[async_trait]
pub trait TokenService: Send + Sync {
    /// Mint an access/refresh pair and persist the refresh token's record.
    async fn issue(&self, account: &accounts::Model) -> Result<TokenPair, Error>;
    /// Redeem a refresh token for a new access token. With rotation enabled
    /// the presented token is revoked and a replacement is returned.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, Error>;
    /// Revoke a refresh token (logout). Revoking an unknown or already
    /// revoked token fails with `TokenInvalid`.
    async fn revoke(&self, refresh_token: &str) -> Result<(), Error>;
    /// Signature + expiry check; refresh tokens additionally require a live
    /// record.
    async fn verify(&self, token: &str) -> Result<Claims, Error>;
    /// Stateless check for request authentication; accepts access tokens only.
    fn decode_access(&self, token: &str) -> Result<Claims, Error>;
}

pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    rotate_on_use: bool,
    refresh_repo: Arc<dyn RefreshTokensRepo>,
}

impl JwtTokenService {
    pub fn new(
        secret: &[u8],
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
        rotate_on_use: bool,
        refresh_repo: Arc<dyn RefreshTokensRepo>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: Duration::seconds(access_ttl_seconds as i64),
            refresh_ttl: Duration::seconds(refresh_ttl_seconds as i64),
            rotate_on_use,
            refresh_repo,
        }
    }

    fn encode(
        &self,
        uid: Uuid,
        email: &str,
        token_type: &str,
        jti: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, Error> {
        let claims = Claims {
            sub: uid.to_string(),
            email: email.to_string(),
            token_type: token_type.to_string(),
            jti: jti.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| Error::Internal(format!("token encoding failed: {}", err)))
    }

    fn decode(&self, token: &str) -> Result<Claims, Error> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| Error::TokenInvalid)
    }

    fn refresh_claims(&self, refresh_token: &str) -> Result<(Claims, Uuid, Uuid), Error> {
        let claims = self.decode(refresh_token)?;
        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(Error::TokenInvalid);
        }
        let uid = Uuid::parse_str(&claims.sub).map_err(|_| Error::TokenInvalid)?;
        let jti = Uuid::parse_str(&claims.jti).map_err(|_| Error::TokenInvalid)?;
        Ok((claims, uid, jti))
    }

    async fn persist_refresh(
        &self,
        jti: Uuid,
        account_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.refresh_repo
            .insert(refresh_tokens::ActiveModel {
                jti: Set(jti),
                account_id: Set(account_id),
                expires_at: Set(expires_at.into()),
                revoked_at: Set(None),
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenService for JwtTokenService {
    async fn issue(&self, account: &accounts::Model) -> Result<TokenPair, Error> {
        let now = Utc::now();
        let access = self.encode(
            account.uid,
            &account.email,
            TOKEN_TYPE_ACCESS,
            Uuid::new_v4(),
            now,
            self.access_ttl,
        )?;

        let jti = Uuid::new_v4();
        let refresh = self.encode(
            account.uid,
            &account.email,
            TOKEN_TYPE_REFRESH,
            jti,
            now,
            self.refresh_ttl,
        )?;
        self.persist_refresh(jti, account.id, now + self.refresh_ttl)
            .await?;

        Ok(TokenPair { access, refresh })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, Error> {
        let (claims, uid, jti) = self.refresh_claims(refresh_token)?;

        let record = self
            .refresh_repo
            .find_active_by_jti(jti)
            .await?
            .ok_or(Error::TokenInvalid)?;

        let now = Utc::now();
        let access = self.encode(
            uid,
            &claims.email,
            TOKEN_TYPE_ACCESS,
            Uuid::new_v4(),
            now,
            self.access_ttl,
        )?;

        if !self.rotate_on_use {
            return Ok(RefreshedTokens {
                access,
                refresh: None,
            });
        }

        // Compare-and-revoke: the loser of a concurrent refresh race sees
        // zero rows here and the presented token stays redeemed-once.
        if !self.refresh_repo.revoke_active_by_jti(jti).await? {
            return Err(Error::TokenInvalid);
        }

        let new_jti = Uuid::new_v4();
        let new_refresh = self.encode(
            uid,
            &claims.email,
            TOKEN_TYPE_REFRESH,
            new_jti,
            now,
            self.refresh_ttl,
        )?;
        self.persist_refresh(new_jti, record.account_id, now + self.refresh_ttl)
            .await?;

        Ok(RefreshedTokens {
            access,
            refresh: Some(new_refresh),
        })
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), Error> {
        let (_, _, jti) = self.refresh_claims(refresh_token)?;
        if !self.refresh_repo.revoke_active_by_jti(jti).await? {
            return Err(Error::TokenInvalid);
        }
        Ok(())
    }

    async fn verify(&self, token: &str) -> Result<Claims, Error> {
        let claims = self.decode(token)?;
        if claims.token_type == TOKEN_TYPE_REFRESH {
            let jti = Uuid::parse_str(&claims.jti).map_err(|_| Error::TokenInvalid)?;
            self.refresh_repo
                .find_active_by_jti(jti)
                .await?
                .ok_or(Error::TokenInvalid)?;
        }
        Ok(claims)
    }

    fn decode_access(&self, token: &str) -> Result<Claims, Error> {
        let claims = self.decode(token)?;
        if claims.token_type != TOKEN_TYPE_ACCESS {
            return Err(Error::TokenInvalid);
        }
        Ok(claims)
    }
}
