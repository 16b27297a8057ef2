//! Storefront API - backend for a shop selling cafe products, flowers and books.
//!
//! Customers and guests browse one catalog split into sections and check out
//! in a single transaction. Staff manage products and orders, admins manage
//! coupons.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core business entities, pricing and order lifecycle
//! - **services**: Application use cases
//! - **infra**: Database, Redis, object storage, unit of work
//! - **jobs**: Background email queue
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared types (pagination, responses)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Run migrations
//! cargo run -- migrate up
//!
//! # Create the first admin
//! cargo run -- admin create --email admin@example.com --password 'SecurePass123!'
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Order, Product, User, UserRole};
pub use errors::{AppError, AppResult};
