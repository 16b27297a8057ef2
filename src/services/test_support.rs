//! Repository mocks wired into a `UnitOfWork` for service unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Product, Section, User, UserRole};
use crate::errors::AppResult;
use crate::infra::repositories::{
    MockAddressRepository, MockCouponRepository, MockOrderRepository, MockProductRepository,
    MockSessionRepository, MockUserRepository,
};
use crate::infra::{
    AddressRepository, CouponRepository, MockTransactionRepository, OrderRepository,
    ProductRepository, SessionRepository, TransactionContext, UnitOfWork, UserRepository,
};

/// Expectations are set on the fields, then `into_uow` freezes them.
#[derive(Default)]
pub(crate) struct Mocks {
    pub users: MockUserRepository,
    pub products: MockProductRepository,
    pub orders: MockOrderRepository,
    pub addresses: MockAddressRepository,
    pub sessions: MockSessionRepository,
    pub coupons: MockCouponRepository,
    /// Statements issued inside `UnitOfWork::transaction`
    pub tx: MockTransactionRepository,
}

impl Mocks {
    pub fn into_uow(self) -> Arc<TestUnitOfWork> {
        Arc::new(TestUnitOfWork {
            users: Arc::new(self.users),
            products: Arc::new(self.products),
            orders: Arc::new(self.orders),
            addresses: Arc::new(self.addresses),
            sessions: Arc::new(self.sessions),
            coupons: Arc::new(self.coupons),
            tx: Arc::new(self.tx),
        })
    }
}

pub(crate) struct TestUnitOfWork {
    users: Arc<MockUserRepository>,
    products: Arc<MockProductRepository>,
    orders: Arc<MockOrderRepository>,
    addresses: Arc<MockAddressRepository>,
    sessions: Arc<MockSessionRepository>,
    coupons: Arc<MockCouponRepository>,
    tx: Arc<MockTransactionRepository>,
}

#[async_trait]
impl UnitOfWork for TestUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn products(&self) -> Arc<dyn ProductRepository> {
        self.products.clone()
    }

    fn orders(&self) -> Arc<dyn OrderRepository> {
        self.orders.clone()
    }

    fn addresses(&self) -> Arc<dyn AddressRepository> {
        self.addresses.clone()
    }

    fn sessions(&self) -> Arc<dyn SessionRepository> {
        self.sessions.clone()
    }

    fn coupons(&self) -> Arc<dyn CouponRepository> {
        self.coupons.clone()
    }

    /// Runs the body against the `tx` mock. Nothing is rolled back, so
    /// failure tests assert which statements were never issued.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        f(TransactionContext::new(self.tx.as_ref())).await
    }
}

pub(crate) fn test_user(role: UserRole) -> User {
    let mut user = User::new(
        Uuid::new_v4(),
        "shopper@example.com".to_string(),
        "hashed".to_string(),
        "Test Shopper".to_string(),
    );
    user.role = role;
    user
}

pub(crate) fn test_product(section: Section, price: &str, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        section,
        name: format!("{} item", section),
        slug: format!("{}-item", section),
        description: None,
        price: price.parse::<Decimal>().unwrap_or_default(),
        stock,
        image_url: None,
        image_key: None,
        is_active: true,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
