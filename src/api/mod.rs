//! HTTP surface of the storefront.
//!
//! Catalog and checkout are public, `/me` belongs to signed-in customers and
//! `/admin` to staff. Authentication, role guards and rate limits are route
//! layers wired up in [`routes`].

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
