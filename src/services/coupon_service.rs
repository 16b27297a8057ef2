//! Coupon administration.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::coupon::normalize_code;
use crate::domain::{Coupon, CreateCoupon};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::types::{Paginated, PaginationParams};

#[async_trait]
pub trait CouponService: Send + Sync {
    async fn create(&self, input: CreateCoupon) -> AppResult<Coupon>;

    async fn list(&self, params: PaginationParams) -> AppResult<Paginated<Coupon>>;

    /// Stop a coupon from being redeemed. Past orders keep their discount.
    async fn deactivate(&self, id: Uuid) -> AppResult<Coupon>;
}

pub struct CouponManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> CouponManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> CouponService for CouponManager<U> {
    async fn create(&self, input: CreateCoupon) -> AppResult<Coupon> {
        input.check()?;

        let code = normalize_code(&input.code);
        let coupons = self.uow.coupons();
        if coupons.find_by_code(&code).await?.is_some() {
            return Err(AppError::conflict("Coupon code"));
        }

        let coupon = Coupon {
            id: Uuid::new_v4(),
            code,
            kind: input.kind,
            value: input.value,
            min_subtotal: input.min_subtotal.unwrap_or(Decimal::ZERO),
            expires_at: input.expires_at,
            usage_limit: input.usage_limit,
            times_used: 0,
            is_active: true,
            created_at: Utc::now(),
        };

        let coupon = coupons.insert(coupon).await?;
        tracing::info!(code = %coupon.code, kind = coupon.kind.as_str(), "Coupon created");
        Ok(coupon)
    }

    async fn list(&self, params: PaginationParams) -> AppResult<Paginated<Coupon>> {
        let (coupons, total) = self.uow.coupons().list(&params).await?;
        Ok(Paginated::new(coupons, params.page, params.limit(), total))
    }

    async fn deactivate(&self, id: Uuid) -> AppResult<Coupon> {
        let coupon = self
            .uow
            .coupons()
            .deactivate(id)
            .await?
            .ok_or(AppError::NotFound)?;
        tracing::info!(code = %coupon.code, "Coupon deactivated");
        Ok(coupon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CouponKind;
    use crate::services::test_support::Mocks;
    use mockall::predicate::eq;

    fn input(code: &str) -> CreateCoupon {
        CreateCoupon {
            code: code.into(),
            kind: CouponKind::Fixed,
            value: "5".parse().unwrap(),
            min_subtotal: None,
            expires_at: None,
            usage_limit: Some(100),
        }
    }

    #[tokio::test]
    async fn test_create_normalises_code() {
        let mut mocks = Mocks::default();
        mocks
            .coupons
            .expect_find_by_code()
            .with(eq("WELCOME5"))
            .returning(|_| Ok(None));
        mocks.coupons.expect_insert().returning(|c| Ok(c));

        let coupon = CouponManager::new(mocks.into_uow())
            .create(input(" welcome5 "))
            .await
            .unwrap();

        assert_eq!(coupon.code, "WELCOME5");
        assert_eq!(coupon.times_used, 0);
        assert_eq!(coupon.min_subtotal, Decimal::ZERO);
        assert!(coupon.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let mut mocks = Mocks::default();
        mocks.coupons.expect_find_by_code().returning(|code| {
            Ok(Some(Coupon {
                id: Uuid::new_v4(),
                code: code.to_string(),
                kind: CouponKind::Fixed,
                value: Decimal::ONE,
                min_subtotal: Decimal::ZERO,
                expires_at: None,
                usage_limit: None,
                times_used: 3,
                is_active: true,
                created_at: Utc::now(),
            }))
        });
        mocks.coupons.expect_insert().never();

        let result = CouponManager::new(mocks.into_uow())
            .create(input("WELCOME5"))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_storage() {
        let result = CouponManager::new(Mocks::default().into_uow())
            .create(input("x"))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_deactivate_unknown_coupon() {
        let mut mocks = Mocks::default();
        mocks.coupons.expect_deactivate().returning(|_| Ok(None));

        let result = CouponManager::new(mocks.into_uow())
            .deactivate(Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
