//! Domain layer - Core business entities and logic
//!
//! Catalog, checkout and account concepts independent of the database and
//! HTTP layers. Pricing lives here as pure functions.

pub mod address;
pub mod coupon;
pub mod order;
pub mod password;
pub mod pricing;
pub mod product;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput, ShippingAddress};
pub use coupon::{Coupon, CouponKind, CreateCoupon};
pub use order::{
    CreateOrder, FulfillmentMethod, Order, OrderFilter, OrderItem, OrderStatus, OrderTracking,
    TrackOrderQuery, TrackedItem, UpdateOrderStatus,
};
pub use password::Password;
pub use pricing::{CartLine, OrderTotals, PricedLine};
pub use product::{
    CreateProduct, Product, ProductFilter, ProductResponse, Section, UpdateProduct,
};
pub use session::{RefreshSession, SessionMeta};
pub use user::{normalize_email, UpdateProfile, User, UserResponse, UserRole};
