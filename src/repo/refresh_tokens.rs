use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter,
};
use uuid::Uuid;

use crate::{entities::refresh_tokens, state::DatabaseClient};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokensRepo: Send + Sync {
    async fn insert(
        &self,
        model: refresh_tokens::ActiveModel,
    ) -> Result<refresh_tokens::Model, sea_orm::DbErr>;
    async fn find_active_by_jti(
        &self,
        jti: Uuid,
    ) -> Result<Option<refresh_tokens::Model>, sea_orm::DbErr>;
    /// Compare-and-revoke: marks the record revoked only if it is still
    /// active. Returns false when no live row matched, which callers treat as
    /// an invalid token. This is the serialization point that keeps a rotated
    /// token from being redeemed twice under concurrent refresh calls.
    async fn revoke_active_by_jti(&self, jti: Uuid) -> Result<bool, sea_orm::DbErr>;
}

pub struct SeaOrmRefreshTokensRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmRefreshTokensRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    fn active_condition() -> Condition {
        Condition::all()
            .add(refresh_tokens::Column::RevokedAt.is_null())
            .add(refresh_tokens::Column::ExpiresAt.gt(Utc::now()))
    }
}

#[async_trait]
impl RefreshTokensRepo for SeaOrmRefreshTokensRepo {
    async fn insert(
        &self,
        model: refresh_tokens::ActiveModel,
    ) -> Result<refresh_tokens::Model, sea_orm::DbErr> {
        model.insert(self.db.conn()).await
    }

    async fn find_active_by_jti(
        &self,
        jti: Uuid,
    ) -> Result<Option<refresh_tokens::Model>, sea_orm::DbErr> {
        refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::Jti.eq(jti))
            .filter(Self::active_condition())
            .one(self.db.conn())
            .await
    }

    async fn revoke_active_by_jti(&self, jti: Uuid) -> Result<bool, sea_orm::DbErr> {
        let result = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(Utc::now()))
            .filter(refresh_tokens::Column::Jti.eq(jti))
            .filter(refresh_tokens::Column::RevokedAt.is_null())
            .exec(self.db.conn())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
