//! Order aggregate: status lifecycle, line items and shipping snapshot.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::address::{AddressInput, ShippingAddress};
use super::pricing::CartLine;
use super::product::Section;
use crate::config::ORDER_NUMBER_PREFIX;
use crate::errors::AppError;

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// States reachable from `self` in one step.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Preparing, Cancelled],
            Preparing => &[Shipped, Delivered, Cancelled],
            Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Customers may only withdraw orders nobody has acted on yet.
    pub fn is_customer_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "preparing" => Ok(OrderStatus::Preparing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::validation(format!("Unknown order status: {}", other))),
        }
    }
}

/// How the order reaches the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentMethod {
    Delivery,
    Pickup,
}

impl FulfillmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Delivery => "delivery",
            FulfillmentMethod::Pickup => "pickup",
        }
    }
}

impl FromStr for FulfillmentMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(FulfillmentMethod::Delivery),
            "pickup" => Ok(FulfillmentMethod::Pickup),
            other => Err(AppError::validation(format!(
                "Unknown fulfillment method: {}",
                other
            ))),
        }
    }
}

/// Generate a human-readable order number, e.g. `ORD-20261019-3F9A12BC`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}-{}", ORDER_NUMBER_PREFIX, now.format("%Y%m%d"), suffix)
}

/// Line item with name and price captured at checkout
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub section: Section,
    #[schema(value_type = String, example = "4.50")]
    pub unit_price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String, example = "9.00")]
    pub line_total: Decimal,
}

/// Order aggregate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    #[schema(example = "ORD-20261019-3F9A12BC")]
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub is_guest: bool,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub status: OrderStatus,
    pub fulfillment: FulfillmentMethod,
    pub shipping_address: Option<ShippingAddress>,
    pub notes: Option<String>,
    pub coupon_code: Option<String>,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub discount: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub shipping: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn belongs_to(&self, user_id: Uuid) -> bool {
        self.customer_id == Some(user_id)
    }
}

/// Reduced view for guest tracking (no customer identifiers)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderTracking {
    pub order_number: String,
    pub status: OrderStatus,
    pub fulfillment: FulfillmentMethod,
    pub items: Vec<TrackedItem>,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackedItem {
    pub product_name: String,
    pub quantity: i32,
}

impl From<Order> for OrderTracking {
    fn from(order: Order) -> Self {
        Self {
            order_number: order.order_number,
            status: order.status,
            fulfillment: order.fulfillment,
            items: order
                .items
                .into_iter()
                .map(|i| TrackedItem {
                    product_name: i.product_name,
                    quantity: i.quantity,
                })
                .collect(),
            total: order.total,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Checkout request. Prices are never taken from the client.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrder {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "guest@example.com")]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 30, message = "Phone is too long"))]
    pub phone: Option<String>,
    pub fulfillment: FulfillmentMethod,
    /// Inline delivery address
    #[validate(nested)]
    pub shipping_address: Option<AddressInput>,
    /// Saved address of the signed-in customer, used instead of an inline one
    pub address_id: Option<Uuid>,
    #[validate(length(max = 500, message = "Notes are too long"))]
    pub notes: Option<String>,
    pub coupon_code: Option<String>,
    #[validate(length(min = 1, message = "Cart must contain at least one item"))]
    pub items: Vec<CartLine>,
}

/// Staff status change
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
}

/// Guest tracking query
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct TrackOrderQuery {
    pub order_number: String,
    pub email: String,
}

/// Staff order listing filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}
