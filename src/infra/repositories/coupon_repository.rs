//! Coupon repository.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::base::fetch_page;
use super::entities::coupon::{self, ActiveModel, Entity as CouponEntity};
use crate::domain::Coupon;
use crate::errors::AppResult;
use crate::types::PaginationParams;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// `code` must already be normalised.
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Coupon>>;

    async fn list(&self, params: &PaginationParams) -> AppResult<(Vec<Coupon>, u64)>;

    async fn insert(&self, coupon: Coupon) -> AppResult<Coupon>;

    /// Returns the updated coupon, or None when `id` is unknown.
    async fn deactivate(&self, id: Uuid) -> AppResult<Option<Coupon>>;
}

pub struct CouponStore {
    db: DatabaseConnection,
}

impl CouponStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CouponRepository for CouponStore {
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
        let model = CouponEntity::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&self.db)
            .await?;
        Ok(model.map(Coupon::from))
    }

    async fn list(&self, params: &PaginationParams) -> AppResult<(Vec<Coupon>, u64)> {
        let select = CouponEntity::find().order_by_desc(coupon::Column::CreatedAt);
        let (models, total) = fetch_page(select, &self.db, params).await?;
        Ok((models.into_iter().map(Coupon::from).collect(), total))
    }

    async fn insert(&self, coupon: Coupon) -> AppResult<Coupon> {
        let model = ActiveModel {
            id: Set(coupon.id),
            code: Set(coupon.code),
            kind: Set(coupon.kind.as_str().to_string()),
            value: Set(coupon.value),
            min_subtotal: Set(coupon.min_subtotal),
            expires_at: Set(coupon.expires_at),
            usage_limit: Set(coupon.usage_limit),
            times_used: Set(coupon.times_used),
            is_active: Set(coupon.is_active),
            created_at: Set(coupon.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(Coupon::from(model))
    }

    async fn deactivate(&self, id: Uuid) -> AppResult<Option<Coupon>> {
        let Some(existing) = CouponEntity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let mut active: ActiveModel = existing.into();
        active.is_active = Set(false);
        let model = active.update(&self.db).await?;
        Ok(Some(Coupon::from(model)))
    }
}

/// Load a coupon by code and lock it for the surrounding transaction.
pub(crate) async fn lock_by_code<C: ConnectionTrait>(
    db: &C,
    code: &str,
) -> AppResult<Option<Coupon>> {
    let model = CouponEntity::find()
        .filter(coupon::Column::Code.eq(code))
        .lock_exclusive()
        .one(db)
        .await?;
    Ok(model.map(Coupon::from))
}

pub(crate) async fn record_use<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<()> {
    CouponEntity::update_many()
        .col_expr(
            coupon::Column::TimesUsed,
            Expr::col(coupon::Column::TimesUsed).add(1),
        )
        .filter(coupon::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}
