//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.
//!
//! All services use Unit of Work pattern for centralized repository
//! access and transaction management.

mod address_service;
mod auth_service;
pub mod container;
mod coupon_service;
mod customer_service;
mod order_service;
mod product_service;

#[cfg(test)]
mod test_support;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use address_service::{AddressManager, AddressService};
pub use auth_service::{AuthService, Authenticator, Claims, Registration, TokenResponse};
pub use coupon_service::{CouponManager, CouponService};
pub use customer_service::{CustomerManager, CustomerService};
pub use order_service::{CheckoutManager, OrderService};
pub use product_service::{CatalogManager, ProductService};

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
