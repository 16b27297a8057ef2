//! Repository layer - Data access abstraction
//!
//! Each aggregate has a repository trait (mockable in tests) and a SeaORM
//! `*Store` implementation. Queries that must also run inside a transaction
//! are free functions generic over the connection.

mod address_repository;
mod base;
pub(crate) mod coupon_repository;
pub(crate) mod entities;
pub(crate) mod order_repository;
pub(crate) mod product_repository;
mod session_repository;
pub(crate) mod user_repository;

pub use address_repository::{AddressRepository, AddressStore};
pub use coupon_repository::{CouponRepository, CouponStore};
pub use order_repository::{OrderRepository, OrderStore};
pub use product_repository::{ProductChanges, ProductRepository, ProductStore};
pub use session_repository::{SessionRepository, SessionStore};
pub use user_repository::{NewUser, UserRepository, UserStore};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use address_repository::MockAddressRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use coupon_repository::MockCouponRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use order_repository::MockOrderRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use product_repository::MockProductRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use session_repository::MockSessionRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
