use async_trait::async_trait;
use chrono::Utc;
use sea_orm::Set;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::{accounts, social_accounts},
    error::Error,
    repo::{accounts::AccountsRepo, social_accounts::SocialAccountsRepo},
    service::auth::normalize_email,
};

/// Read projection of an account: the row, its linked identities, and the
/// audit back-references resolved to emails (the actor may itself be
/// soft-deleted, hence the include-deleted lookup).
pub struct Profile {
    pub account: accounts::Model,
    pub identities: Vec<social_accounts::Model>,
    pub created_by_email: Option<String>,
    pub updated_by_email: Option<String>,
}

#[derive(Default)]
pub struct UpdateProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait AccountsService: Send + Sync {
    async fn get_by_uid(&self, uid: Uuid) -> Result<Option<accounts::Model>, Error>;
    async fn get_by_email(&self, email: &str) -> Result<Option<accounts::Model>, Error>;
    async fn profile(&self, account: &accounts::Model) -> Result<Profile, Error>;
    /// Partial update of mutable profile attributes only; never email,
    /// password, or identifiers.
    async fn update_profile(
        &self,
        account: &accounts::Model,
        input: UpdateProfileInput,
    ) -> Result<accounts::Model, Error>;
    async fn mark_email_verified(&self, account_id: i64) -> Result<accounts::Model, Error>;
    /// Soft delete: the row is flagged and timestamped, never removed.
    async fn deactivate(
        &self,
        uid: Uuid,
        deleted_by: Option<Uuid>,
    ) -> Result<Option<accounts::Model>, Error>;
}

pub struct AccountsServiceImpl {
    accounts_repo: Arc<dyn AccountsRepo>,
    social_repo: Arc<dyn SocialAccountsRepo>,
}

impl AccountsServiceImpl {
    pub fn new(
        accounts_repo: Arc<dyn AccountsRepo>,
        social_repo: Arc<dyn SocialAccountsRepo>,
    ) -> Self {
        Self {
            accounts_repo,
            social_repo,
        }
    }

    async fn resolve_audit_email(&self, uid: Option<Uuid>) -> Result<Option<String>, Error> {
        let Some(uid) = uid else {
            return Ok(None);
        };
        Ok(self
            .accounts_repo
            .find_by_uid_any(uid)
            .await?
            .map(|account| account.email))
    }
}

#[async_trait]
impl AccountsService for AccountsServiceImpl {
    async fn get_by_uid(&self, uid: Uuid) -> Result<Option<accounts::Model>, Error> {
        Ok(self.accounts_repo.find_by_uid(uid).await?)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<accounts::Model>, Error> {
        let email = normalize_email(email)?;
        Ok(self.accounts_repo.find_by_email(&email).await?)
    }

    async fn profile(&self, account: &accounts::Model) -> Result<Profile, Error> {
        let identities = self.social_repo.list_by_account(account.id).await?;
        let created_by_email = self.resolve_audit_email(account.created_by).await?;
        let updated_by_email = self.resolve_audit_email(account.updated_by).await?;
        Ok(Profile {
            account: account.clone(),
            identities,
            created_by_email,
            updated_by_email,
        })
    }

    async fn update_profile(
        &self,
        account: &accounts::Model,
        input: UpdateProfileInput,
    ) -> Result<accounts::Model, Error> {
        let mut active: accounts::ActiveModel = account.clone().into();
        if let Some(first_name) = input.first_name {
            active.first_name = Set(Some(first_name));
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(Some(last_name));
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(bio) = input.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(avatar) = input.avatar {
            active.avatar = Set(Some(avatar));
        }
        active.updated_by = Set(Some(account.uid));

        Ok(self.accounts_repo.update(active).await?)
    }

    async fn mark_email_verified(&self, account_id: i64) -> Result<accounts::Model, Error> {
        let Some(account) = self.accounts_repo.find_by_id(account_id).await? else {
            return Err(Error::InvalidVerificationToken);
        };
        let uid = account.uid;
        let mut active: accounts::ActiveModel = account.into();
        active.email_verified_at = Set(Some(Utc::now().into()));
        active.updated_by = Set(Some(uid));
        Ok(self.accounts_repo.update(active).await?)
    }

    async fn deactivate(
        &self,
        uid: Uuid,
        deleted_by: Option<Uuid>,
    ) -> Result<Option<accounts::Model>, Error> {
        let Some(account) = self.accounts_repo.find_by_uid(uid).await? else {
            return Ok(None);
        };

        let actor = deleted_by.unwrap_or(account.uid);
        let mut active: accounts::ActiveModel = account.into();
        active.is_active = Set(false);
        active.is_deleted = Set(true);
        active.deleted_at = Set(Some(Utc::now().into()));
        active.deleted_by = Set(Some(actor));
        active.updated_by = Set(Some(actor));

        let updated = self.accounts_repo.update(active).await?;
        tracing::info!(email = %updated.email, uid = %updated.uid, "account deactivated");
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{accounts::MockAccountsRepo, social_accounts::MockSocialAccountsRepo};
    use sea_orm::ActiveValue::Set;

    fn account() -> accounts::Model {
        accounts::Model {
            id: 3,
            uid: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: Some("hash".to_string()),
            username: Some("a".to_string()),
            first_name: Some("A".to_string()),
            last_name: None,
            phone: None,
            bio: None,
            avatar: None,
            email_verified_at: None,
            is_active: true,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            deleted_at: None,
            created_by: None,
            updated_by: None,
            deleted_by: None,
        }
    }

    fn echo_update(model: accounts::ActiveModel) -> accounts::Model {
        let base = account();
        accounts::Model {
            first_name: match model.first_name {
                Set(value) => value,
                _ => base.first_name,
            },
            last_name: match model.last_name {
                Set(value) => value,
                _ => base.last_name,
            },
            phone: match model.phone {
                Set(value) => value,
                _ => base.phone,
            },
            bio: match model.bio {
                Set(value) => value,
                _ => base.bio,
            },
            avatar: match model.avatar {
                Set(value) => value,
                _ => base.avatar,
            },
            updated_by: match model.updated_by {
                Set(value) => value,
                _ => base.updated_by,
            },
            is_active: match model.is_active {
                Set(value) => value,
                _ => base.is_active,
            },
            is_deleted: match model.is_deleted {
                Set(value) => value,
                _ => base.is_deleted,
            },
            deleted_at: match model.deleted_at {
                Set(value) => value,
                _ => base.deleted_at,
            },
            deleted_by: match model.deleted_by {
                Set(value) => value,
                _ => base.deleted_by,
            },
            email_verified_at: match model.email_verified_at {
                Set(value) => value,
                _ => base.email_verified_at,
            },
            ..base
        }
    }

    #[tokio::test]
    async fn update_profile_touches_only_provided_fields_and_updater() {
        let account = account();
        let uid = account.uid;
        let mut accounts_repo = MockAccountsRepo::new();
        accounts_repo
            .expect_update()
            .withf(move |model| {
                matches!(&model.first_name, Set(Some(name)) if name == "B")
                    && matches!(model.last_name, sea_orm::ActiveValue::Unchanged(_))
                    && matches!(&model.email, sea_orm::ActiveValue::Unchanged(_))
                    && matches!(&model.updated_by, Set(Some(updater)) if *updater == uid)
            })
            .returning(|model| Ok(echo_update(model)));
        let service = AccountsServiceImpl::new(
            Arc::new(accounts_repo),
            Arc::new(MockSocialAccountsRepo::new()),
        );

        let updated = service
            .update_profile(
                &account,
                UpdateProfileInput {
                    first_name: Some("B".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.first_name.as_deref(), Some("B"));
        assert_eq!(updated.updated_by, Some(uid));
    }

    #[tokio::test]
    async fn profile_resolves_audit_references_through_the_any_finder() {
        let mut account = account();
        let creator_uid = Uuid::new_v4();
        account.created_by = Some(creator_uid);

        let mut accounts_repo = MockAccountsRepo::new();
        accounts_repo.expect_find_by_uid_any().returning(move |uid| {
            let mut creator = self::tests_creator();
            creator.uid = uid;
            Ok(Some(creator))
        });
        let mut social_repo = MockSocialAccountsRepo::new();
        social_repo.expect_list_by_account().returning(|_| Ok(vec![]));
        let service = AccountsServiceImpl::new(Arc::new(accounts_repo), Arc::new(social_repo));

        let profile = service.profile(&account).await.expect("profile");
        assert_eq!(profile.created_by_email.as_deref(), Some("admin@x.com"));
        assert!(profile.updated_by_email.is_none());
    }

    fn tests_creator() -> accounts::Model {
        let mut creator = account();
        creator.email = "admin@x.com".to_string();
        // The creator may itself be soft-deleted; resolution still works.
        creator.is_deleted = true;
        creator
    }

    #[tokio::test]
    async fn deactivate_flags_without_removing() {
        let target = account();
        let uid = target.uid;
        let mut accounts_repo = MockAccountsRepo::new();
        accounts_repo
            .expect_find_by_uid()
            .returning(move |_| Ok(Some(account())));
        accounts_repo
            .expect_update()
            .withf(move |model| {
                matches!(model.is_active, Set(false))
                    && matches!(model.is_deleted, Set(true))
                    && matches!(model.deleted_at, Set(Some(_)))
                    && matches!(&model.deleted_by, Set(Some(actor)) if *actor == uid)
            })
            .returning(|model| Ok(echo_update(model)));
        let service = AccountsServiceImpl::new(
            Arc::new(accounts_repo),
            Arc::new(MockSocialAccountsRepo::new()),
        );

        let deactivated = service
            .deactivate(uid, Some(uid))
            .await
            .expect("deactivate")
            .expect("account existed");
        assert!(!deactivated.is_active);
        assert!(deactivated.is_deleted);
        assert!(deactivated.deleted_at.is_some());
    }
}
