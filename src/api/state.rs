//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::config::Config;
use crate::infra::{Cache, Database, HealthCheck, ObjectStorage, RateLimiter};
use crate::jobs::EmailQueue;
use crate::services::{
    AddressService, AuthService, CouponService, CustomerService, OrderService, ProductService,
    ServiceContainer, Services,
};

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub customer_service: Arc<dyn CustomerService>,
    pub address_service: Arc<dyn AddressService>,
    pub product_service: Arc<dyn ProductService>,
    pub order_service: Arc<dyn OrderService>,
    pub coupon_service: Arc<dyn CouponService>,
    /// Request counters for the rate limiting middleware
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Probes reported by `/health`
    pub health_checks: Vec<Arc<dyn HealthCheck>>,
}

impl AppState {
    /// Wire services over the live database, Redis, object storage and job queue.
    pub fn from_config(
        database: Arc<Database>,
        cache: Arc<Cache>,
        storage: Arc<dyn ObjectStorage>,
        email_queue: Arc<dyn EmailQueue>,
        config: Config,
    ) -> Self {
        let container = Services::from_connection(
            database.get_connection(),
            config,
            cache.clone(),
            storage,
            email_queue,
        );

        let database: Arc<dyn HealthCheck> = database;
        let redis: Arc<dyn HealthCheck> = cache.clone();
        Self::new(&container, cache, vec![database, redis])
    }

    /// Build state from any service container (fakes in tests).
    pub fn new(
        services: &dyn ServiceContainer,
        rate_limiter: Arc<dyn RateLimiter>,
        health_checks: Vec<Arc<dyn HealthCheck>>,
    ) -> Self {
        Self {
            auth_service: services.auth(),
            customer_service: services.customers(),
            address_service: services.addresses(),
            product_service: services.products(),
            order_service: services.orders(),
            coupon_service: services.coupons(),
            rate_limiter,
            health_checks,
        }
    }
}
