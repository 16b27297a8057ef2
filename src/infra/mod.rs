//! Infrastructure layer - External systems integration
//!
//! - Database connection, migrations and repositories
//! - Redis cache and rate limiting counters
//! - Health probes for the database and Redis
//! - S3-compatible object storage
//! - Unit of Work for transaction management

pub mod cache;
pub mod db;
pub mod health;
pub mod repositories;
pub mod storage;
pub mod unit_of_work;

pub use cache::{Cache, ProductCache, RateLimiter};
pub use db::{Database, Migrator};
pub use health::HealthCheck;
pub use repositories::{
    AddressRepository, CouponRepository, NewUser, OrderRepository, ProductChanges,
    ProductRepository, SessionRepository, UserRepository,
};
pub use storage::{ObjectStorage, S3Storage};
pub use unit_of_work::{Persistence, TransactionContext, TransactionRepository, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
pub use cache::{MockProductCache, MockRateLimiter};
#[cfg(any(test, feature = "test-utils"))]
pub use storage::MockObjectStorage;
#[cfg(any(test, feature = "test-utils"))]
pub use unit_of_work::MockTransactionRepository;
