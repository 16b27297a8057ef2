//! Unit of Work: repository access and transaction management.
//!
//! Reads and single-row writes go through the repository traits. Work that
//! must commit or roll back as one unit runs inside `transaction`, which hands
//! the closure a `TransactionContext` whose repositories share one database
//! transaction. The statements available there form the
//! `TransactionRepository` trait, so tests can drive a transaction body with
//! a mock.

use async_trait::async_trait;
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::repositories::{
    coupon_repository, order_repository, product_repository, user_repository, AddressRepository,
    AddressStore, CouponRepository, CouponStore, OrderRepository, OrderStore, ProductChanges,
    ProductRepository, ProductStore, SessionRepository, SessionStore, UserRepository, UserStore,
};
use crate::domain::{Coupon, Order, OrderStatus, Product, User};
use crate::errors::{AppError, AppResult};

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly because `transaction` is generic; tests wrap the
/// repository mocks and a `MockTransactionRepository` in their own
/// implementation.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;

    fn products(&self) -> Arc<dyn ProductRepository>;

    fn orders(&self) -> Arc<dyn OrderRepository>;

    fn addresses(&self) -> Arc<dyn AddressRepository>;

    fn sessions(&self) -> Arc<dyn SessionRepository>;

    fn coupons(&self) -> Arc<dyn CouponRepository>;

    /// Execute a closure within a transaction.
    ///
    /// Committed when the closure returns `Ok`, rolled back otherwise.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send;
}

/// Statements that run inside an open transaction.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Load and row-lock products (`SELECT ... FOR UPDATE`), ordered by id.
    async fn lock_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;

    /// Guarded decrement; `false` when the row cannot cover `quantity`.
    async fn take_stock(&self, product_id: Uuid, quantity: i32) -> AppResult<bool>;

    async fn return_stock(&self, product_id: Uuid, quantity: i32) -> AppResult<()>;

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product>;

    async fn insert_order(&self, order: &Order) -> AppResult<()>;

    /// Load an order with its items and lock the header row.
    async fn lock_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<()>;

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Active (not soft-deleted) user by normalised email.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn lock_coupon(&self, code: &str) -> AppResult<Option<Coupon>>;

    async fn record_coupon_use(&self, id: Uuid) -> AppResult<()>;
}

/// Repository access bound to one open transaction.
pub struct TransactionContext<'a> {
    repo: &'a dyn TransactionRepository,
}

impl<'a> TransactionContext<'a> {
    pub fn new(repo: &'a dyn TransactionRepository) -> Self {
        Self { repo }
    }

    pub fn products(&self) -> TxProductRepository<'_> {
        TxProductRepository { repo: self.repo }
    }

    pub fn orders(&self) -> TxOrderRepository<'_> {
        TxOrderRepository { repo: self.repo }
    }

    pub fn users(&self) -> TxUserRepository<'_> {
        TxUserRepository { repo: self.repo }
    }

    pub fn coupons(&self) -> TxCouponRepository<'_> {
        TxCouponRepository { repo: self.repo }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
    product_repo: Arc<ProductStore>,
    order_repo: Arc<OrderStore>,
    address_repo: Arc<AddressStore>,
    session_repo: Arc<SessionStore>,
    coupon_repo: Arc<CouponStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            user_repo: Arc::new(UserStore::new(db.clone())),
            product_repo: Arc::new(ProductStore::new(db.clone())),
            order_repo: Arc::new(OrderStore::new(db.clone())),
            address_repo: Arc::new(AddressStore::new(db.clone())),
            session_repo: Arc::new(SessionStore::new(db.clone())),
            coupon_repo: Arc::new(CouponStore::new(db.clone())),
            db,
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    fn products(&self) -> Arc<dyn ProductRepository> {
        self.product_repo.clone()
    }

    fn orders(&self) -> Arc<dyn OrderRepository> {
        self.order_repo.clone()
    }

    fn addresses(&self) -> Arc<dyn AddressRepository> {
        self.address_repo.clone()
    }

    fn sessions(&self) -> Arc<dyn SessionRepository> {
        self.session_repo.clone()
    }

    fn coupons(&self) -> Arc<dyn CouponRepository> {
        self.coupon_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
            > + Send,
        T: Send,
    {
        // Row locks taken inside the closure serialise competing checkouts
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::ReadCommitted),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(AppError::from)?;

        let store = TransactionStore { txn: &txn };
        let outcome = f(TransactionContext::new(&store)).await;

        match outcome {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// SeaORM statements on an open `DatabaseTransaction`.
struct TransactionStore<'t> {
    txn: &'t DatabaseTransaction,
}

#[async_trait]
impl<'t> TransactionRepository for TransactionStore<'t> {
    async fn lock_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        product_repository::lock_many(self.txn, ids).await
    }

    async fn take_stock(&self, product_id: Uuid, quantity: i32) -> AppResult<bool> {
        product_repository::take_stock(self.txn, product_id, quantity).await
    }

    async fn return_stock(&self, product_id: Uuid, quantity: i32) -> AppResult<()> {
        product_repository::return_stock(self.txn, product_id, quantity).await
    }

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product> {
        product_repository::update_fields(self.txn, id, changes).await
    }

    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        order_repository::insert(self.txn, order).await
    }

    async fn lock_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        order_repository::lock_one(self.txn, id).await
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<()> {
        order_repository::set_status(self.txn, id, status).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        user_repository::find_by_id(self.txn, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        user_repository::find_by_email(self.txn, email).await
    }

    async fn lock_coupon(&self, code: &str) -> AppResult<Option<Coupon>> {
        coupon_repository::lock_by_code(self.txn, code).await
    }

    async fn record_coupon_use(&self, id: Uuid) -> AppResult<()> {
        coupon_repository::record_use(self.txn, id).await
    }
}

/// Product access inside a transaction.
pub struct TxProductRepository<'a> {
    repo: &'a dyn TransactionRepository,
}

impl<'a> TxProductRepository<'a> {
    /// Load and row-lock the given products (`SELECT ... FOR UPDATE`).
    pub async fn lock_many(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        self.repo.lock_products(ids).await
    }

    /// Decrement stock, failing when the row cannot cover `quantity`.
    pub async fn take_stock(&self, product: &Product, quantity: i32) -> AppResult<()> {
        if self.repo.take_stock(product.id, quantity).await? {
            Ok(())
        } else {
            Err(AppError::InsufficientStock(product.name.clone()))
        }
    }

    pub async fn return_stock(&self, id: Uuid, quantity: i32) -> AppResult<()> {
        self.repo.return_stock(id, quantity).await
    }

    pub async fn update_fields(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product> {
        self.repo.update_product(id, changes).await
    }
}

/// Order access inside a transaction.
pub struct TxOrderRepository<'a> {
    repo: &'a dyn TransactionRepository,
}

impl<'a> TxOrderRepository<'a> {
    pub async fn insert(&self, order: &Order) -> AppResult<()> {
        self.repo.insert_order(order).await
    }

    pub async fn lock(&self, id: Uuid) -> AppResult<Option<Order>> {
        self.repo.lock_order(id).await
    }

    pub async fn set_status(&self, id: Uuid, status: OrderStatus) -> AppResult<()> {
        self.repo.set_order_status(id, status).await
    }
}

/// User lookups inside a transaction.
pub struct TxUserRepository<'a> {
    repo: &'a dyn TransactionRepository,
}

impl<'a> TxUserRepository<'a> {
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.repo.find_user_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.repo.find_user_by_email(email).await
    }
}

/// Coupon access inside a transaction.
pub struct TxCouponRepository<'a> {
    repo: &'a dyn TransactionRepository,
}

impl<'a> TxCouponRepository<'a> {
    pub async fn lock_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
        self.repo.lock_coupon(code).await
    }

    pub async fn record_use(&self, id: Uuid) -> AppResult<()> {
        self.repo.record_coupon_use(id).await
    }
}

/// Shorthand for running a block inside `UnitOfWork::transaction`.
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| Box::pin(async move { $body })).await
    };
}
