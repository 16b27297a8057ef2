//! Checkout arithmetic.
//!
//! Pure functions only: cart normalisation, shipping fee and order totals.
//! Every money amount leaves this module rounded to cents.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::order::FulfillmentMethod;
use crate::config::{MAX_CART_LINES, MAX_LINE_QUANTITY, MONEY_SCALE};
use crate::errors::{AppError, AppResult};

/// Round a money amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// One requested cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    #[schema(example = 2)]
    pub quantity: i32,
}

/// Merge duplicate product lines and check quantity bounds.
///
/// Order of first appearance is preserved.
pub fn normalize_cart(lines: &[CartLine]) -> AppResult<Vec<CartLine>> {
    if lines.is_empty() {
        return Err(AppError::validation("Cart must contain at least one item"));
    }

    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::validation("Quantity must be at least 1"));
        }
        match index.get(&line.product_id) {
            Some(&i) => merged[i].quantity = merged[i].quantity.saturating_add(line.quantity),
            None => {
                index.insert(line.product_id, merged.len());
                merged.push(*line);
            }
        }
    }

    if merged.len() > MAX_CART_LINES {
        return Err(AppError::validation(format!(
            "Cart may contain at most {} different products",
            MAX_CART_LINES
        )));
    }
    if let Some(line) = merged.iter().find(|l| l.quantity > MAX_LINE_QUANTITY) {
        return Err(AppError::validation(format!(
            "Quantity for product {} exceeds the limit of {}",
            line.product_id, MAX_LINE_QUANTITY
        )));
    }

    Ok(merged)
}

/// Price and quantity of a line after server-side lookup.
#[derive(Debug, Clone, Copy)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        round_money(self.unit_price * Decimal::from(self.quantity))
    }
}

/// Delivery fee: pickup is free; delivery is free from the threshold on.
pub fn shipping_fee(
    fulfillment: FulfillmentMethod,
    discounted_subtotal: Decimal,
    flat_fee: Decimal,
    free_threshold: Decimal,
) -> Decimal {
    match fulfillment {
        FulfillmentMethod::Pickup => Decimal::ZERO,
        FulfillmentMethod::Delivery if discounted_subtotal >= free_threshold => Decimal::ZERO,
        FulfillmentMethod::Delivery => round_money(flat_fee),
    }
}

/// Computed order amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// `total = subtotal - discount + tax + shipping`, with
    /// `tax = round((subtotal - discount) * tax_rate, 2)`.
    ///
    /// The discount is clamped to `[0, subtotal]`.
    pub fn compute(
        lines: &[PricedLine],
        discount: Decimal,
        shipping: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
        let discount = round_money(discount.max(Decimal::ZERO).min(subtotal));
        let taxable = subtotal - discount;
        let tax = round_money(taxable * tax_rate);
        let shipping = round_money(shipping.max(Decimal::ZERO));

        Self {
            subtotal,
            discount,
            tax,
            shipping,
            total: taxable + tax + shipping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(price: &str, quantity: i32) -> PricedLine {
        PricedLine {
            unit_price: dec(price),
            quantity,
        }
    }

    #[test]
    fn test_totals_identity_and_tax_rounding() {
        let lines = [line("4.50", 2), line("12.99", 1)];
        let totals = OrderTotals::compute(&lines, dec("2.00"), dec("5.00"), dec("0.18"));

        assert_eq!(totals.subtotal, dec("21.99"));
        assert_eq!(totals.discount, dec("2.00"));
        // 19.99 * 0.18 = 3.5982
        assert_eq!(totals.tax, dec("3.60"));
        assert_eq!(totals.shipping, dec("5.00"));
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount + totals.tax + totals.shipping
        );
        assert_eq!(totals.total, dec("28.59"));
    }

    #[test]
    fn test_tax_midpoint_rounds_away_from_zero() {
        // 0.25 * 0.18 = 0.045
        let totals = OrderTotals::compute(&[line("0.25", 1)], Decimal::ZERO, Decimal::ZERO, dec("0.18"));
        assert_eq!(totals.tax, dec("0.05"));
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let totals = OrderTotals::compute(&[line("3.00", 1)], dec("10.00"), Decimal::ZERO, dec("0.18"));
        assert_eq!(totals.discount, dec("3.00"));
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);

        let negative = OrderTotals::compute(&[line("3.00", 1)], dec("-1"), Decimal::ZERO, dec("0.18"));
        assert_eq!(negative.discount, Decimal::ZERO);
    }

    #[test]
    fn test_totals_hold_for_many_carts() {
        let prices = ["0.01", "0.99", "1.05", "4.50", "19.95", "120.00"];
        for (i, a) in prices.iter().enumerate() {
            for b in &prices[i..] {
                for qty in 1..4 {
                    let lines = [line(a, qty), line(b, qty + 1)];
                    let t = OrderTotals::compute(&lines, dec("1.10"), dec("5.00"), dec("0.18"));
                    assert_eq!(t.total, t.subtotal - t.discount + t.tax + t.shipping);
                    assert_eq!(t.tax, t.tax.round_dp(2));
                    assert!(t.tax >= Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_shipping_fee_rules() {
        let flat = dec("5.00");
        let threshold = dec("50.00");
        assert_eq!(
            shipping_fee(FulfillmentMethod::Pickup, dec("10"), flat, threshold),
            Decimal::ZERO
        );
        assert_eq!(
            shipping_fee(FulfillmentMethod::Delivery, dec("49.99"), flat, threshold),
            flat
        );
        assert_eq!(
            shipping_fee(FulfillmentMethod::Delivery, dec("50.00"), flat, threshold),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_normalize_cart_merges_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let cart = normalize_cart(&[
            CartLine { product_id: a, quantity: 1 },
            CartLine { product_id: b, quantity: 2 },
            CartLine { product_id: a, quantity: 3 },
        ])
        .unwrap();

        assert_eq!(
            cart,
            vec![
                CartLine { product_id: a, quantity: 4 },
                CartLine { product_id: b, quantity: 2 },
            ]
        );
    }

    #[test]
    fn test_normalize_cart_rejects_bad_input() {
        assert!(normalize_cart(&[]).is_err());

        let id = Uuid::new_v4();
        assert!(normalize_cart(&[CartLine { product_id: id, quantity: 0 }]).is_err());
        assert!(normalize_cart(&[
            CartLine { product_id: id, quantity: 60 },
            CartLine { product_id: id, quantity: 60 },
        ])
        .is_err());
    }
}
