//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.

pub mod address;
pub mod coupon;
pub mod order;
pub mod order_item;
pub mod product;
pub mod refresh_session;
pub mod user;
