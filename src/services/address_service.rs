//! Customer address book.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Address, AddressInput};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait AddressService: Send + Sync {
    async fn list(&self, user_id: Uuid) -> AppResult<Vec<Address>>;

    /// The first address a customer saves becomes the default.
    async fn create(&self, user_id: Uuid, input: AddressInput) -> AppResult<Address>;

    async fn update(&self, user_id: Uuid, id: Uuid, input: AddressInput) -> AppResult<Address>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<()>;

    async fn set_default(&self, user_id: Uuid, id: Uuid) -> AppResult<Address>;
}

pub struct AddressManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> AddressManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

fn check(input: &AddressInput) -> AppResult<()> {
    input
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))
}

#[async_trait]
impl<U: UnitOfWork> AddressService for AddressManager<U> {
    async fn list(&self, user_id: Uuid) -> AppResult<Vec<Address>> {
        self.uow.addresses().list_for_user(user_id).await
    }

    async fn create(&self, user_id: Uuid, input: AddressInput) -> AppResult<Address> {
        check(&input)?;
        let addresses = self.uow.addresses();
        let is_first = addresses.count_for_user(user_id).await? == 0;
        addresses.create(user_id, input, is_first).await
    }

    async fn update(&self, user_id: Uuid, id: Uuid, input: AddressInput) -> AppResult<Address> {
        check(&input)?;
        self.uow.addresses().update(id, user_id, input).await
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        let addresses = self.uow.addresses();
        let existing = addresses
            .find_for_user(id, user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !addresses.delete(id, user_id).await? {
            return Err(AppError::NotFound);
        }

        // Hand the default flag to the most recent remaining address
        if existing.is_default {
            if let Some(next) = addresses.list_for_user(user_id).await?.first() {
                addresses.set_default(next.id, user_id).await?;
            }
        }
        Ok(())
    }

    async fn set_default(&self, user_id: Uuid, id: Uuid) -> AppResult<Address> {
        let addresses = self.uow.addresses();
        let mut address = addresses
            .find_for_user(id, user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        addresses.set_default(id, user_id).await?;
        address.is_default = true;
        Ok(address)
    }
}
