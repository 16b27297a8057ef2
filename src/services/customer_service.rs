//! Customer account self-service: profile, password and account closure.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Password, UpdateProfile, User};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait CustomerService: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> AppResult<User>;

    async fn update_profile(&self, user_id: Uuid, changes: UpdateProfile) -> AppResult<User>;

    /// Change the password and end every session.
    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: String,
        new_password: String,
    ) -> AppResult<()>;

    /// Soft delete the account and end every session.
    async fn delete_account(&self, user_id: Uuid) -> AppResult<()>;
}

pub struct CustomerManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> CustomerManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> CustomerService for CustomerManager<U> {
    async fn get_profile(&self, user_id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn update_profile(&self, user_id: Uuid, changes: UpdateProfile) -> AppResult<User> {
        if let Some(name) = &changes.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Name must not be blank"));
            }
        }
        let changes = UpdateProfile {
            name: changes.name.map(|n| n.trim().to_string()),
            phone: changes.phone.map(|p| p.trim().to_string()),
        };
        self.uow.users().update_profile(user_id, changes).await
    }

    async fn change_password(
        &self,
        user_id: Uuid,
        current_password: String,
        new_password: String,
    ) -> AppResult<()> {
        let user = self.get_profile(user_id).await?;
        if !Password::from_hash(user.password_hash).verify(&current_password) {
            return Err(AppError::InvalidCredentials);
        }

        let hash = Password::new(&new_password)?.into_string();
        self.uow.users().update_password(user_id, hash).await?;

        let revoked = self.uow.sessions().delete_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "Password changed");
        Ok(())
    }

    async fn delete_account(&self, user_id: Uuid) -> AppResult<()> {
        self.uow.users().soft_delete(user_id).await?;
        self.uow.sessions().delete_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, "Account closed");
        Ok(())
    }
}
