//! Discount coupons applied at checkout.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::pricing::round_money;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// `value` is a percentage of the subtotal (0-100]
    Percent,
    /// `value` is a fixed amount off
    Fixed,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Percent => "percent",
            CouponKind::Fixed => "fixed",
        }
    }
}

impl FromStr for CouponKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(CouponKind::Percent),
            "fixed" => Ok(CouponKind::Fixed),
            other => Err(AppError::validation(format!("Unknown coupon kind: {}", other))),
        }
    }
}

/// Coupon code stored upper-case without surrounding whitespace.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    #[schema(example = "SPRING10")]
    pub code: String,
    pub kind: CouponKind,
    #[schema(value_type = String, example = "10")]
    pub value: Decimal,
    #[schema(value_type = String, example = "0")]
    pub min_subtotal: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Discount this coupon grants on `subtotal` at `now`.
    pub fn discount_for(&self, subtotal: Decimal, now: DateTime<Utc>) -> AppResult<Decimal> {
        if !self.is_active {
            return Err(AppError::validation("Coupon is not active"));
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(AppError::validation("Coupon has expired"));
        }
        if self.usage_limit.is_some_and(|limit| self.times_used >= limit) {
            return Err(AppError::validation("Coupon usage limit reached"));
        }
        if subtotal < self.min_subtotal {
            return Err(AppError::validation(format!(
                "Coupon requires a subtotal of at least {}",
                self.min_subtotal
            )));
        }

        let raw = match self.kind {
            CouponKind::Percent => subtotal * self.value / Decimal::ONE_HUNDRED,
            CouponKind::Fixed => self.value,
        };
        Ok(round_money(raw.min(subtotal)))
    }
}

/// Coupon creation payload
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCoupon {
    pub code: String,
    pub kind: CouponKind,
    #[schema(value_type = String)]
    pub value: Decimal,
    #[schema(value_type = Option<String>)]
    pub min_subtotal: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
}

impl CreateCoupon {
    pub fn check(&self) -> AppResult<()> {
        let code = normalize_code(&self.code);
        if code.len() < 3 || code.len() > 32 || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(AppError::validation(
                "Coupon code must be 3-32 letters, digits or dashes",
            ));
        }
        if self.value <= Decimal::ZERO {
            return Err(AppError::validation("Coupon value must be positive"));
        }
        if self.kind == CouponKind::Percent && self.value > Decimal::ONE_HUNDRED {
            return Err(AppError::validation("Percent coupons cannot exceed 100"));
        }
        if self.min_subtotal.is_some_and(|m| m < Decimal::ZERO) {
            return Err(AppError::validation("Minimum subtotal cannot be negative"));
        }
        if self.usage_limit.is_some_and(|l| l < 1) {
            return Err(AppError::validation("Usage limit must be at least 1"));
        }
        Ok(())
    }
}
