//! HTTP request handlers.

pub mod account_handler;
pub mod auth_handler;
pub mod coupon_handler;
pub mod order_handler;
pub mod product_handler;

pub use account_handler::{account_routes, session_routes};
pub use auth_handler::auth_routes;
pub use coupon_handler::coupon_routes;
pub use order_handler::{admin_order_routes, checkout_routes, my_order_routes, tracking_routes};
pub use product_handler::{admin_product_routes, product_routes};
