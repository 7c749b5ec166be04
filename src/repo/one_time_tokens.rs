use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter,
};

use crate::{entities::one_time_tokens, state::DatabaseClient};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OneTimeTokensRepo: Send + Sync {
    async fn insert(
        &self,
        model: one_time_tokens::ActiveModel,
    ) -> Result<one_time_tokens::Model, sea_orm::DbErr>;
    async fn find_active_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<one_time_tokens::Model>, sea_orm::DbErr>;
    async fn find_active_by_account_and_purpose(
        &self,
        account_id: i64,
        purpose: &str,
    ) -> Result<Option<one_time_tokens::Model>, sea_orm::DbErr>;
    /// Compare-and-consume; returns false when the token was already consumed.
    async fn consume_by_id(&self, id: i64) -> Result<bool, sea_orm::DbErr>;
}

pub struct SeaOrmOneTimeTokensRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmOneTimeTokensRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    fn active_condition() -> Condition {
        Condition::all()
            .add(one_time_tokens::Column::ConsumedAt.is_null())
            .add(one_time_tokens::Column::ExpiresAt.gt(Utc::now()))
    }
}

#[async_trait]
impl OneTimeTokensRepo for SeaOrmOneTimeTokensRepo {
    async fn insert(
        &self,
        model: one_time_tokens::ActiveModel,
    ) -> Result<one_time_tokens::Model, sea_orm::DbErr> {
        model.insert(self.db.conn()).await
    }

    async fn find_active_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<one_time_tokens::Model>, sea_orm::DbErr> {
        one_time_tokens::Entity::find()
            .filter(one_time_tokens::Column::TokenHash.eq(token_hash))
            .filter(Self::active_condition())
            .one(self.db.conn())
            .await
    }

    async fn find_active_by_account_and_purpose(
        &self,
        account_id: i64,
        purpose: &str,
    ) -> Result<Option<one_time_tokens::Model>, sea_orm::DbErr> {
        one_time_tokens::Entity::find()
            .filter(one_time_tokens::Column::AccountId.eq(account_id))
            .filter(one_time_tokens::Column::Purpose.eq(purpose))
            .filter(Self::active_condition())
            .one(self.db.conn())
            .await
    }

    async fn consume_by_id(&self, id: i64) -> Result<bool, sea_orm::DbErr> {
        let result = one_time_tokens::Entity::update_many()
            .col_expr(one_time_tokens::Column::ConsumedAt, Expr::value(Utc::now()))
            .filter(one_time_tokens::Column::Id.eq(id))
            .filter(one_time_tokens::Column::ConsumedAt.is_null())
            .exec(self.db.conn())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
