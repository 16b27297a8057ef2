//! Customer address book repository. Every query is scoped to the owner.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::entities::address::{self, ActiveModel, Entity as AddressEntity};
use crate::domain::{Address, AddressInput};
use crate::errors::{AppError, AppResult};

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Address>>;

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Address>>;

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64>;

    async fn create(
        &self,
        user_id: Uuid,
        input: AddressInput,
        is_default: bool,
    ) -> AppResult<Address>;

    async fn update(&self, id: Uuid, user_id: Uuid, input: AddressInput) -> AppResult<Address>;

    /// Returns false when nothing matched.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<bool>;

    /// Flag `id` as default and clear the flag on the owner's other rows.
    async fn set_default(&self, id: Uuid, user_id: Uuid) -> AppResult<()>;
}

pub struct AddressStore {
    db: DatabaseConnection,
}

impl AddressStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AddressRepository for AddressStore {
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Address>> {
        let models = AddressEntity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Address::from).collect())
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Address>> {
        let model = AddressEntity::find_by_id(id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(model.map(Address::from))
    }

    async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let count = AddressEntity::find()
            .filter(address::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn create(
        &self,
        user_id: Uuid,
        input: AddressInput,
        is_default: bool,
    ) -> AppResult<Address> {
        let input = input.normalized();
        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            label: Set(input.label),
            recipient: Set(input.recipient),
            phone: Set(input.phone),
            line1: Set(input.line1),
            line2: Set(input.line2),
            city: Set(input.city),
            region: Set(input.region),
            postal_code: Set(input.postal_code),
            country: Set(input.country),
            is_default: Set(is_default),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        Ok(Address::from(model))
    }

    async fn update(&self, id: Uuid, user_id: Uuid, input: AddressInput) -> AppResult<Address> {
        let existing = AddressEntity::find_by_id(id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let input = input.normalized();
        let mut active: ActiveModel = existing.into();
        active.label = Set(input.label);
        active.recipient = Set(input.recipient);
        active.phone = Set(input.phone);
        active.line1 = Set(input.line1);
        active.line2 = Set(input.line2);
        active.city = Set(input.city);
        active.region = Set(input.region);
        active.postal_code = Set(input.postal_code);
        active.country = Set(input.country);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Address::from(model))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = AddressEntity::delete_many()
            .filter(address::Column::Id.eq(id))
            .filter(address::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn set_default(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        // One statement, so the owner never has two defaults
        AddressEntity::update_many()
            .col_expr(address::Column::IsDefault, Expr::col(address::Column::Id).eq(id))
            .col_expr(address::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(address::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
