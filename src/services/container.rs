//! Service Container - Centralized service access.
//!
//! Handlers reach every use case through the `ServiceContainer` trait, so
//! tests can swap in fakes without touching the database.

use std::sync::Arc;

use super::{
    AddressService, AuthService, CouponService, CustomerService, OrderService, ProductService,
};
use crate::config::Config;
use crate::infra::{ObjectStorage, Persistence, ProductCache};
use crate::jobs::EmailQueue;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn customers(&self) -> Arc<dyn CustomerService>;

    fn addresses(&self) -> Arc<dyn AddressService>;

    fn products(&self) -> Arc<dyn ProductService>;

    fn orders(&self) -> Arc<dyn OrderService>;

    fn coupons(&self) -> Arc<dyn CouponService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    customer_service: Arc<dyn CustomerService>,
    address_service: Arc<dyn AddressService>,
    product_service: Arc<dyn ProductService>,
    order_service: Arc<dyn OrderService>,
    coupon_service: Arc<dyn CouponService>,
}

impl Services {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        customer_service: Arc<dyn CustomerService>,
        address_service: Arc<dyn AddressService>,
        product_service: Arc<dyn ProductService>,
        order_service: Arc<dyn OrderService>,
        coupon_service: Arc<dyn CouponService>,
    ) -> Self {
        Self {
            auth_service,
            customer_service,
            address_service,
            product_service,
            order_service,
            coupon_service,
        }
    }

    /// Wire every service over one database connection.
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        config: Config,
        cache: Arc<dyn ProductCache>,
        storage: Arc<dyn ObjectStorage>,
        email_queue: Arc<dyn EmailQueue>,
    ) -> Self {
        use super::{
            AddressManager, Authenticator, CatalogManager, CheckoutManager, CouponManager,
            CustomerManager,
        };

        let uow = Arc::new(Persistence::new(db));
        let max_image_bytes = config.storage.max_image_bytes;
        let pricing = config.pricing.clone();

        Self {
            auth_service: Arc::new(Authenticator::new(uow.clone(), config)),
            customer_service: Arc::new(CustomerManager::new(uow.clone())),
            address_service: Arc::new(AddressManager::new(uow.clone())),
            product_service: Arc::new(CatalogManager::new(
                uow.clone(),
                cache.clone(),
                storage,
                max_image_bytes,
            )),
            order_service: Arc::new(CheckoutManager::new(
                uow.clone(),
                cache,
                email_queue,
                pricing,
            )),
            coupon_service: Arc::new(CouponManager::new(uow)),
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn customers(&self) -> Arc<dyn CustomerService> {
        self.customer_service.clone()
    }

    fn addresses(&self) -> Arc<dyn AddressService> {
        self.address_service.clone()
    }

    fn products(&self) -> Arc<dyn ProductService> {
        self.product_service.clone()
    }

    fn orders(&self) -> Arc<dyn OrderService> {
        self.order_service.clone()
    }

    fn coupons(&self) -> Arc<dyn CouponService> {
        self.coupon_service.clone()
    }
}
