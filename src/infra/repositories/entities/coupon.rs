//! Coupon entity.

use sea_orm::entity::prelude::*;

use crate::domain::{Coupon, CouponKind};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub kind: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub min_subtotal: Decimal,
    pub expires_at: Option<DateTimeUtc>,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Coupon {
    fn from(model: Model) -> Self {
        Coupon {
            id: model.id,
            code: model.code,
            kind: model.kind.parse().unwrap_or(CouponKind::Fixed),
            value: model.value,
            min_subtotal: model.min_subtotal,
            expires_at: model.expires_at,
            usage_limit: model.usage_limit,
            times_used: model.times_used,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}
