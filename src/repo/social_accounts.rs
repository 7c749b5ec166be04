use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
};

use crate::{entities::social_accounts, state::DatabaseClient};

/// Linked-identity storage. The disconnect safety check runs against a single
/// transaction, so the count/find/delete entry points are all txn-scoped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialAccountsRepo: Send + Sync {
    async fn list_by_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<social_accounts::Model>, sea_orm::DbErr>;
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: social_accounts::ActiveModel,
    ) -> Result<social_accounts::Model, sea_orm::DbErr>;
    async fn find_by_provider_uid_with_txn(
        &self,
        txn: &DatabaseTransaction,
        provider: &str,
        provider_uid: &str,
    ) -> Result<Option<social_accounts::Model>, sea_orm::DbErr>;
    async fn find_by_account_and_provider_with_txn(
        &self,
        txn: &DatabaseTransaction,
        account_id: i64,
        provider: &str,
    ) -> Result<Option<social_accounts::Model>, sea_orm::DbErr>;
    async fn count_by_account_with_txn(
        &self,
        txn: &DatabaseTransaction,
        account_id: i64,
    ) -> Result<u64, sea_orm::DbErr>;
    async fn delete_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i64,
    ) -> Result<(), sea_orm::DbErr>;
}

pub struct SeaOrmSocialAccountsRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmSocialAccountsRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SocialAccountsRepo for SeaOrmSocialAccountsRepo {
    async fn list_by_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<social_accounts::Model>, sea_orm::DbErr> {
        social_accounts::Entity::find()
            .filter(social_accounts::Column::AccountId.eq(account_id))
            .all(self.db.conn())
            .await
    }

    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: social_accounts::ActiveModel,
    ) -> Result<social_accounts::Model, sea_orm::DbErr> {
        model.insert(txn).await
    }

    async fn find_by_provider_uid_with_txn(
        &self,
        txn: &DatabaseTransaction,
        provider: &str,
        provider_uid: &str,
    ) -> Result<Option<social_accounts::Model>, sea_orm::DbErr> {
        social_accounts::Entity::find()
            .filter(social_accounts::Column::Provider.eq(provider))
            .filter(social_accounts::Column::ProviderUid.eq(provider_uid))
            .one(txn)
            .await
    }

    async fn find_by_account_and_provider_with_txn(
        &self,
        txn: &DatabaseTransaction,
        account_id: i64,
        provider: &str,
    ) -> Result<Option<social_accounts::Model>, sea_orm::DbErr> {
        social_accounts::Entity::find()
            .filter(social_accounts::Column::AccountId.eq(account_id))
            .filter(social_accounts::Column::Provider.eq(provider))
            .one(txn)
            .await
    }

    async fn count_by_account_with_txn(
        &self,
        txn: &DatabaseTransaction,
        account_id: i64,
    ) -> Result<u64, sea_orm::DbErr> {
        social_accounts::Entity::find()
            .filter(social_accounts::Column::AccountId.eq(account_id))
            .count(txn)
            .await
    }

    async fn delete_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i64,
    ) -> Result<(), sea_orm::DbErr> {
        social_accounts::Entity::delete_by_id(id).exec(txn).await?;
        Ok(())
    }
}
