//! Checkout and order lifecycle.
//!
//! `create_order` prices the cart from the database, takes stock, applies the
//! coupon and persists the order inside one transaction. Side effects that
//! must not undo a paid-for order (confirmation email, cache invalidation)
//! run after commit and only log on failure.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::domain::coupon::normalize_code;
use crate::domain::order::generate_order_number;
use crate::domain::pricing::{normalize_cart, shipping_fee};
use crate::domain::{
    normalize_email, AddressInput, CartLine, CreateOrder, FulfillmentMethod, Order, OrderFilter,
    OrderItem, OrderStatus, OrderTotals, OrderTracking, PricedLine, Product, ShippingAddress,
    TrackOrderQuery, User,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{ProductCache, UnitOfWork};
use crate::jobs::{EmailJob, EmailQueue};
use crate::types::{Paginated, PaginationParams};
use crate::with_transaction;

#[async_trait]
pub trait OrderService: Send + Sync {
    /// Place an order. `customer_id` is set for signed-in customers only.
    async fn create_order(
        &self,
        request: CreateOrder,
        customer_id: Option<Uuid>,
    ) -> AppResult<Order>;

    /// Guest tracking by order number and email.
    async fn track(&self, query: TrackOrderQuery) -> AppResult<OrderTracking>;

    async fn list_for_customer(
        &self,
        customer_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<Paginated<Order>>;

    async fn get_for_customer(&self, id: Uuid, customer_id: Uuid) -> AppResult<Order>;

    /// Withdraw a pending order and put its stock back.
    async fn cancel_for_customer(&self, id: Uuid, customer_id: Uuid) -> AppResult<Order>;

    async fn list(&self, filter: OrderFilter, params: PaginationParams)
        -> AppResult<Paginated<Order>>;

    async fn get(&self, id: Uuid) -> AppResult<Order>;

    /// Staff status change along the transition table.
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Order>;
}

/// Order fields fixed before the transaction starts.
struct OrderDraft {
    cart: Vec<CartLine>,
    customer_id: Option<Uuid>,
    email: String,
    name: String,
    phone: Option<String>,
    fulfillment: FulfillmentMethod,
    shipping_address: Option<ShippingAddress>,
    notes: Option<String>,
    coupon_code: Option<String>,
}

/// A cart line matched to its locked product row.
#[derive(Debug, Clone)]
struct PlannedLine {
    product: Product,
    quantity: i32,
}

impl PlannedLine {
    fn priced(&self) -> PricedLine {
        PricedLine {
            unit_price: self.product.price,
            quantity: self.quantity,
        }
    }

    fn into_item(self) -> OrderItem {
        let line_total = self.priced().line_total();
        OrderItem {
            id: Uuid::new_v4(),
            product_id: self.product.id,
            product_name: self.product.name,
            section: self.product.section,
            unit_price: self.product.price,
            quantity: self.quantity,
            line_total,
        }
    }
}

/// Match every cart line to a purchasable product with enough stock.
fn plan_lines(cart: &[CartLine], products: Vec<Product>) -> AppResult<Vec<PlannedLine>> {
    let mut by_id: HashMap<Uuid, Product> = products.into_iter().map(|p| (p.id, p)).collect();

    cart.iter()
        .map(|line| {
            let product = by_id
                .remove(&line.product_id)
                .ok_or_else(|| AppError::Unavailable(format!("Product {}", line.product_id)))?;
            if !product.is_purchasable() {
                return Err(AppError::Unavailable(product.name));
            }
            if !product.has_stock_for(line.quantity) {
                return Err(AppError::InsufficientStock(product.name));
            }
            Ok(PlannedLine {
                product,
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Resolve the order owner: the signed-in customer, else an existing
/// customer account registered under the order email, else a guest.
fn link_customer(signed_in: Option<Uuid>, by_email: Option<&User>) -> (Option<Uuid>, bool) {
    match (signed_in, by_email) {
        (Some(id), _) => (Some(id), false),
        (None, Some(user)) if user.is_customer() && user.is_active() => (Some(user.id), false),
        _ => (None, true),
    }
}

pub struct CheckoutManager<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Arc<dyn ProductCache>,
    email_queue: Arc<dyn EmailQueue>,
    pricing: PricingConfig,
}

impl<U: UnitOfWork> CheckoutManager<U> {
    pub fn new(
        uow: Arc<U>,
        cache: Arc<dyn ProductCache>,
        email_queue: Arc<dyn EmailQueue>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            uow,
            cache,
            email_queue,
            pricing,
        }
    }

    /// Request checks that need no locks.
    async fn draft(&self, request: CreateOrder, customer_id: Option<Uuid>) -> AppResult<OrderDraft> {
        let cart = normalize_cart(&request.items)?;

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("Name is required"));
        }

        let shipping_address = match request.fulfillment {
            FulfillmentMethod::Pickup => None,
            FulfillmentMethod::Delivery => Some(
                self.delivery_address(request.address_id, request.shipping_address, customer_id)
                    .await?,
            ),
        };

        Ok(OrderDraft {
            cart,
            customer_id,
            email: normalize_email(&request.email),
            name,
            phone: request.phone.filter(|p| !p.trim().is_empty()),
            fulfillment: request.fulfillment,
            shipping_address,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            coupon_code: request
                .coupon_code
                .map(|c| normalize_code(&c))
                .filter(|c| !c.is_empty()),
        })
    }

    async fn delivery_address(
        &self,
        address_id: Option<Uuid>,
        inline: Option<AddressInput>,
        customer_id: Option<Uuid>,
    ) -> AppResult<ShippingAddress> {
        match (address_id, inline) {
            (Some(address_id), _) => {
                let customer_id = customer_id.ok_or_else(|| {
                    AppError::validation("Saved addresses require signing in")
                })?;
                let address = self
                    .uow
                    .addresses()
                    .find_for_user(address_id, customer_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                Ok(ShippingAddress::from(address))
            }
            (None, Some(input)) => Ok(ShippingAddress::from(input)),
            (None, None) => Err(AppError::validation(
                "Delivery orders need a shipping address",
            )),
        }
    }

    async fn find(&self, id: Uuid) -> AppResult<Order> {
        self.uow
            .orders()
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn find_owned(&self, id: Uuid, customer_id: Uuid) -> AppResult<Order> {
        let order = self.find(id).await?;
        if !order.belongs_to(customer_id) {
            return Err(AppError::NotFound);
        }
        Ok(order)
    }

    /// Move an order to `next` under a row lock, restocking on cancellation.
    /// With `owner` set, the customer cancellation rules are rechecked on
    /// the locked row.
    async fn transition(
        &self,
        id: Uuid,
        next: OrderStatus,
        owner: Option<Uuid>,
    ) -> AppResult<Order> {
        let order = with_transaction!(self.uow, |ctx| {
            let mut order = ctx.orders().lock(id).await?.ok_or(AppError::NotFound)?;
            if let Some(owner) = owner {
                if !order.belongs_to(owner) {
                    return Err(AppError::NotFound);
                }
                if !order.status.is_customer_cancellable() {
                    return Err(AppError::validation(format!(
                        "Order can no longer be cancelled (status: {})",
                        order.status
                    )));
                }
            }
            if !order.status.can_transition_to(next) {
                return Err(AppError::validation(format!(
                    "Cannot change order status from {} to {}",
                    order.status, next
                )));
            }

            if next == OrderStatus::Cancelled {
                let products = ctx.products();
                for item in &order.items {
                    products.return_stock(item.product_id, item.quantity).await?;
                }
            }
            ctx.orders().set_status(id, next).await?;

            order.status = next;
            order.updated_at = Utc::now();
            Ok(order)
        })?;

        if next == OrderStatus::Cancelled {
            self.forget_products(&order).await;
        }
        tracing::info!(order_number = %order.order_number, status = %next, "Order status changed");
        Ok(order)
    }

    async fn forget_products(&self, order: &Order) {
        let ids: Vec<Uuid> = order.items.iter().map(|i| i.product_id).collect();
        if let Err(e) = self.cache.invalidate_products(&ids).await {
            tracing::warn!(order_number = %order.order_number, error = %e, "Product cache invalidation failed");
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> OrderService for CheckoutManager<U> {
    async fn create_order(
        &self,
        request: CreateOrder,
        customer_id: Option<Uuid>,
    ) -> AppResult<Order> {
        let draft = self.draft(request, customer_id).await?;
        let pricing = self.pricing.clone();

        let order = with_transaction!(self.uow, |ctx| {
            let ids: Vec<Uuid> = draft.cart.iter().map(|l| l.product_id).collect();
            let products = ctx.products().lock_many(&ids).await?;
            let lines = plan_lines(&draft.cart, products)?;
            let priced: Vec<PricedLine> = lines.iter().map(PlannedLine::priced).collect();
            let subtotal: Decimal = priced.iter().map(PricedLine::line_total).sum();

            let now = Utc::now();
            let coupon = match &draft.coupon_code {
                Some(code) => Some(
                    ctx.coupons()
                        .lock_by_code(code)
                        .await?
                        .ok_or_else(|| AppError::validation("Unknown coupon code"))?,
                ),
                None => None,
            };
            let discount = match &coupon {
                Some(coupon) => coupon.discount_for(subtotal, now)?,
                None => Decimal::ZERO,
            };

            let shipping = shipping_fee(
                draft.fulfillment,
                subtotal - discount,
                pricing.shipping_flat_fee,
                pricing.free_shipping_threshold,
            );
            let totals = OrderTotals::compute(&priced, discount, shipping, pricing.tax_rate);

            let products = ctx.products();
            for line in &lines {
                products.take_stock(&line.product, line.quantity).await?;
            }

            let by_email = match draft.customer_id {
                // Access tokens outlive account deletion
                Some(id) => match ctx.users().find_by_id(id).await? {
                    Some(user) if user.is_customer() && user.is_active() => None,
                    _ => return Err(AppError::Unauthorized),
                },
                None => ctx.users().find_by_email(&draft.email).await?,
            };
            let (customer_id, is_guest) = link_customer(draft.customer_id, by_email.as_ref());

            if let Some(coupon) = &coupon {
                ctx.coupons().record_use(coupon.id).await?;
            }

            let order = Order {
                id: Uuid::new_v4(),
                order_number: generate_order_number(now),
                customer_id,
                is_guest,
                email: draft.email,
                name: draft.name,
                phone: draft.phone,
                status: OrderStatus::Pending,
                fulfillment: draft.fulfillment,
                shipping_address: draft.shipping_address,
                notes: draft.notes,
                coupon_code: coupon.map(|c| c.code),
                subtotal: totals.subtotal,
                discount: totals.discount,
                tax: totals.tax,
                shipping: totals.shipping,
                total: totals.total,
                items: lines.into_iter().map(PlannedLine::into_item).collect(),
                created_at: now,
                updated_at: now,
            };
            ctx.orders().insert(&order).await?;
            Ok(order)
        })?;

        tracing::info!(
            order_number = %order.order_number,
            total = %order.total,
            is_guest = order.is_guest,
            "Order placed"
        );

        if let Err(e) = self
            .email_queue
            .enqueue(EmailJob::order_confirmation(&order))
            .await
        {
            tracing::warn!(order_number = %order.order_number, error = %e, "Confirmation email not queued");
        }
        self.forget_products(&order).await;

        Ok(order)
    }

    async fn track(&self, query: TrackOrderQuery) -> AppResult<OrderTracking> {
        let order = self
            .uow
            .orders()
            .find_by_number(query.order_number.trim())
            .await?
            .ok_or(AppError::NotFound)?;

        // Same answer for a wrong email and an unknown number
        if order.email != normalize_email(&query.email) {
            return Err(AppError::NotFound);
        }
        Ok(OrderTracking::from(order))
    }

    async fn list_for_customer(
        &self,
        customer_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<Paginated<Order>> {
        let (orders, total) = self
            .uow
            .orders()
            .list_for_customer(customer_id, &params)
            .await?;
        Ok(Paginated::new(orders, params.page, params.limit(), total))
    }

    async fn get_for_customer(&self, id: Uuid, customer_id: Uuid) -> AppResult<Order> {
        self.find_owned(id, customer_id).await
    }

    async fn cancel_for_customer(&self, id: Uuid, customer_id: Uuid) -> AppResult<Order> {
        let order = self.find_owned(id, customer_id).await?;
        if !order.status.is_customer_cancellable() {
            return Err(AppError::validation(format!(
                "Order can no longer be cancelled (status: {})",
                order.status
            )));
        }
        self.transition(id, OrderStatus::Cancelled, Some(customer_id)).await
    }

    async fn list(
        &self,
        filter: OrderFilter,
        params: PaginationParams,
    ) -> AppResult<Paginated<Order>> {
        let (orders, total) = self.uow.orders().list(&filter, &params).await?;
        Ok(Paginated::new(orders, params.page, params.limit(), total))
    }

    async fn get(&self, id: Uuid) -> AppResult<Order> {
        self.find(id).await
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Order> {
        let order = self.find(id).await?;
        if !order.status.can_transition_to(status) {
            return Err(AppError::validation(format!(
                "Cannot change order status from {} to {}",
                order.status, status
            )));
        }
        self.transition(id, status, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Coupon, CouponKind, Section, UserRole};
    use crate::infra::MockProductCache;
    use crate::jobs::MockEmailQueue;
    use crate::services::test_support::{test_product, test_user, Mocks, TestUnitOfWork};
    use mockall::predicate::eq;
    use mockall::Sequence;

    /// No cache or email expectations: reaching either side effect fails.
    fn service(mocks: Mocks) -> CheckoutManager<TestUnitOfWork> {
        CheckoutManager::new(
            mocks.into_uow(),
            Arc::new(MockProductCache::new()),
            Arc::new(MockEmailQueue::new()),
            PricingConfig::default(),
        )
    }

    /// Accepts the after-commit side effects.
    fn committing_service(mocks: Mocks) -> CheckoutManager<TestUnitOfWork> {
        let mut cache = MockProductCache::new();
        cache
            .expect_invalidate_products()
            .times(1)
            .returning(|_| Ok(()));
        let mut queue = MockEmailQueue::new();
        queue.expect_enqueue().times(1).returning(|_| Ok(()));
        CheckoutManager::new(
            mocks.into_uow(),
            Arc::new(cache),
            Arc::new(queue),
            PricingConfig::default(),
        )
    }

    fn percent_coupon(code: &str, percent: &str) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: code.into(),
            kind: CouponKind::Percent,
            value: percent.parse().unwrap(),
            min_subtotal: Decimal::ZERO,
            expires_at: None,
            usage_limit: None,
            times_used: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn item(product: &Product, quantity: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            product_id: product.id,
            product_name: product.name.clone(),
            section: product.section,
            unit_price: product.price,
            quantity,
            line_total: product.price * Decimal::from(quantity),
        }
    }

    fn money(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn request(fulfillment: FulfillmentMethod) -> CreateOrder {
        CreateOrder {
            email: "Guest@Example.com".into(),
            name: "Guest".into(),
            phone: None,
            fulfillment,
            shipping_address: None,
            address_id: None,
            notes: None,
            coupon_code: None,
            items: vec![CartLine {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
        }
    }

    fn order_for(customer_id: Option<Uuid>, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-20261019-0A1B2C3D".into(),
            customer_id,
            is_guest: customer_id.is_none(),
            email: "guest@example.com".into(),
            name: "Guest".into(),
            phone: None,
            status,
            fulfillment: FulfillmentMethod::Pickup,
            shipping_address: None,
            notes: None,
            coupon_code: None,
            subtotal: Decimal::new(450, 2),
            discount: Decimal::ZERO,
            tax: Decimal::new(81, 2),
            shipping: Decimal::ZERO,
            total: Decimal::new(531, 2),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_plan_lines_checks_availability_and_stock() {
        let latte = test_product(Section::Cafe, "4.50", 3);
        let cart = [CartLine {
            product_id: latte.id,
            quantity: 3,
        }];
        let planned = plan_lines(&cart, vec![latte.clone()]).unwrap();
        assert_eq!(planned[0].quantity, 3);

        let too_many = [CartLine {
            product_id: latte.id,
            quantity: 4,
        }];
        assert!(matches!(
            plan_lines(&too_many, vec![latte.clone()]),
            Err(AppError::InsufficientStock(_))
        ));

        let mut deleted = latte.clone();
        deleted.deleted_at = Some(Utc::now());
        assert!(matches!(
            plan_lines(&cart, vec![deleted]),
            Err(AppError::Unavailable(_))
        ));

        let mut inactive = latte;
        inactive.is_active = false;
        assert!(matches!(
            plan_lines(&cart, vec![inactive]),
            Err(AppError::Unavailable(_))
        ));

        assert!(matches!(plan_lines(&cart, Vec::new()), Err(AppError::Unavailable(_))));
    }

    #[test]
    fn test_items_snapshot_prices() {
        let roses = test_product(Section::Flowers, "12.99", 10);
        let cart = [CartLine {
            product_id: roses.id,
            quantity: 2,
        }];
        let item = plan_lines(&cart, vec![roses.clone()])
            .unwrap()
            .remove(0)
            .into_item();

        assert_eq!(item.product_id, roses.id);
        assert_eq!(item.product_name, roses.name);
        assert_eq!(item.section, Section::Flowers);
        assert_eq!(item.unit_price, "12.99".parse::<Decimal>().unwrap());
        assert_eq!(item.line_total, "25.98".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_link_customer_precedence() {
        let signed_in = Uuid::new_v4();
        let customer = test_user(UserRole::Customer);
        let staff = test_user(UserRole::Staff);

        assert_eq!(link_customer(Some(signed_in), Some(&customer)), (Some(signed_in), false));
        assert_eq!(link_customer(None, Some(&customer)), (Some(customer.id), false));
        assert_eq!(link_customer(None, Some(&staff)), (None, true));
        assert_eq!(link_customer(None, None), (None, true));

        let mut deleted = test_user(UserRole::Customer);
        deleted.deleted_at = Some(Utc::now());
        assert_eq!(link_customer(None, Some(&deleted)), (None, true));
    }

    #[tokio::test]
    async fn test_delivery_requires_address() {
        let result = service(Mocks::default())
            .create_order(request(FulfillmentMethod::Delivery), None)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_saved_address_requires_sign_in() {
        let mut req = request(FulfillmentMethod::Delivery);
        req.address_id = Some(Uuid::new_v4());

        let result = service(Mocks::default()).create_order(req, None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_saved_address_of_other_customer_not_found() {
        let customer_id = Uuid::new_v4();
        let address_id = Uuid::new_v4();

        let mut mocks = Mocks::default();
        mocks
            .addresses
            .expect_find_for_user()
            .with(eq(address_id), eq(customer_id))
            .returning(|_, _| Ok(None));

        let mut req = request(FulfillmentMethod::Delivery);
        req.address_id = Some(address_id);

        let result = service(mocks).create_order(req, Some(customer_id)).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_saved_address_becomes_snapshot() {
        let customer_id = Uuid::new_v4();
        let now = Utc::now();
        let address = Address {
            id: Uuid::new_v4(),
            user_id: customer_id,
            label: None,
            recipient: "Ada".into(),
            phone: None,
            line1: "1 Main St".into(),
            line2: None,
            city: "Izmir".into(),
            region: None,
            postal_code: "35000".into(),
            country: "TR".into(),
            is_default: true,
            created_at: now,
            updated_at: now,
        };
        let address_id = address.id;

        let mut mocks = Mocks::default();
        mocks
            .addresses
            .expect_find_for_user()
            .returning(move |_, _| Ok(Some(address.clone())));

        let snapshot = service(mocks)
            .delivery_address(Some(address_id), None, Some(customer_id))
            .await
            .unwrap();
        assert_eq!(snapshot.city, "Izmir");
    }

    #[tokio::test]
    async fn test_draft_normalises_request() {
        let mut req = request(FulfillmentMethod::Delivery);
        req.shipping_address = Some(AddressInput {
            label: None,
            recipient: "Guest".into(),
            phone: None,
            line1: "5 Book Row".into(),
            line2: None,
            city: "Bursa".into(),
            region: None,
            postal_code: "16000".into(),
            country: "tr".into(),
        });
        req.coupon_code = Some(" spring10 ".into());
        req.notes = Some("   ".into());
        let product_id = req.items[0].product_id;
        req.items.push(CartLine {
            product_id,
            quantity: 2,
        });

        let draft = service(Mocks::default()).draft(req, None).await.unwrap();
        assert_eq!(draft.email, "guest@example.com");
        assert_eq!(draft.coupon_code.as_deref(), Some("SPRING10"));
        assert!(draft.notes.is_none());
        assert_eq!(draft.cart.len(), 1);
        assert_eq!(draft.cart[0].quantity, 3);
        assert_eq!(draft.shipping_address.unwrap().country, "TR");
    }

    #[tokio::test]
    async fn test_pickup_ignores_address() {
        let draft = service(Mocks::default())
            .draft(request(FulfillmentMethod::Pickup), None)
            .await
            .unwrap();
        assert!(draft.shipping_address.is_none());
    }

    #[tokio::test]
    async fn test_track_requires_matching_email() {
        let order = order_for(None, OrderStatus::Pending);
        let number = order.order_number.clone();

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_number()
            .with(eq(number.clone()))
            .returning(move |_| Ok(Some(order.clone())));
        let svc = service(mocks);

        let tracked = svc
            .track(TrackOrderQuery {
                order_number: number.clone(),
                email: "GUEST@example.com ".into(),
            })
            .await
            .unwrap();
        assert_eq!(tracked.status, OrderStatus::Pending);

        let wrong = svc
            .track(TrackOrderQuery {
                order_number: number,
                email: "someone@example.com".into(),
            })
            .await;
        assert!(matches!(wrong, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_track_unknown_number() {
        let mut mocks = Mocks::default();
        mocks.orders.expect_find_by_number().returning(|_| Ok(None));

        let result = service(mocks)
            .track(TrackOrderQuery {
                order_number: "ORD-X".into(),
                email: "guest@example.com".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_customer_cannot_see_others_orders() {
        let owner = Uuid::new_v4();
        let order = order_for(Some(owner), OrderStatus::Pending);
        let id = order.id;

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(order.clone())));
        let svc = service(mocks);

        assert!(svc.get_for_customer(id, owner).await.is_ok());
        assert!(matches!(
            svc.get_for_customer(id, Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            svc.cancel_for_customer(id, Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_only_pending_orders_cancellable() {
        let owner = Uuid::new_v4();
        let order = order_for(Some(owner), OrderStatus::Confirmed);
        let id = order.id;

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(order.clone())));

        let result = service(mocks).cancel_for_customer(id, owner).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_invalid_status_transition_rejected() {
        let order = order_for(None, OrderStatus::Delivered);
        let id = order.id;

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(order.clone())));

        let result = service(mocks)
            .update_status(id, OrderStatus::Pending)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_checkout_takes_stock_redeems_coupon_and_stores_totals() {
        let latte = test_product(Section::Cafe, "4.50", 10);
        let roses = test_product(Section::Flowers, "12.99", 5);
        let coupon = percent_coupon("SPRING10", "10");
        let coupon_id = coupon.id;

        let mut req = request(FulfillmentMethod::Pickup);
        req.coupon_code = Some("spring10".into());
        req.items = vec![
            CartLine {
                product_id: latte.id,
                quantity: 2,
            },
            CartLine {
                product_id: roses.id,
                quantity: 1,
            },
        ];

        // 21.99 subtotal, 10% off rounds 2.199 up to 2.20
        let expected = OrderTotals::compute(
            &[
                PricedLine {
                    unit_price: latte.price,
                    quantity: 2,
                },
                PricedLine {
                    unit_price: roses.price,
                    quantity: 1,
                },
            ],
            money("2.20"),
            Decimal::ZERO,
            PricingConfig::default().tax_rate,
        );

        let mut mocks = Mocks::default();
        let mut seq = Sequence::new();
        let (latte_id, roses_id) = (latte.id, roses.id);
        let locked = vec![latte.clone(), roses.clone()];
        mocks
            .tx
            .expect_lock_products()
            .withf(move |ids| ids.len() == 2 && ids.contains(&latte_id) && ids.contains(&roses_id))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(locked.clone()));
        mocks
            .tx
            .expect_lock_coupon()
            .with(eq("SPRING10"))
            .times(1)
            .returning(move |_| Ok(Some(coupon.clone())));
        mocks
            .tx
            .expect_take_stock()
            .with(eq(latte_id), eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        mocks
            .tx
            .expect_take_stock()
            .with(eq(roses_id), eq(1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        mocks
            .tx
            .expect_find_user_by_email()
            .with(eq("guest@example.com"))
            .times(1)
            .returning(|_| Ok(None));
        mocks
            .tx
            .expect_record_coupon_use()
            .with(eq(coupon_id))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mocks
            .tx
            .expect_insert_order()
            .withf(move |order| {
                order.subtotal == expected.subtotal
                    && order.discount == expected.discount
                    && order.tax == expected.tax
                    && order.shipping == expected.shipping
                    && order.total == expected.total
                    && order.items.len() == 2
                    && order.is_guest
                    && order.customer_id.is_none()
                    && order.coupon_code.as_deref() == Some("SPRING10")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let order = committing_service(mocks)
            .create_order(req, None)
            .await
            .unwrap();

        assert_eq!(order.subtotal, money("21.99"));
        assert_eq!(order.discount, money("2.20"));
        assert_eq!(order.total, expected.total);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items[0].unit_price, money("4.50"));
        assert_eq!(order.items[0].line_total, money("9.00"));
    }

    #[tokio::test]
    async fn test_checkout_links_existing_customer_by_email() {
        let novel = test_product(Section::Books, "8.00", 3);
        let mut customer = test_user(UserRole::Customer);
        customer.email = "guest@example.com".into();
        let customer_id = customer.id;

        let mut req = request(FulfillmentMethod::Pickup);
        req.items[0].product_id = novel.id;

        let mut mocks = Mocks::default();
        mocks
            .tx
            .expect_lock_products()
            .returning(move |_| Ok(vec![novel.clone()]));
        mocks.tx.expect_take_stock().returning(|_, _| Ok(true));
        mocks
            .tx
            .expect_find_user_by_email()
            .returning(move |_| Ok(Some(customer.clone())));
        mocks
            .tx
            .expect_insert_order()
            .withf(move |order| order.customer_id == Some(customer_id) && !order.is_guest)
            .times(1)
            .returning(|_| Ok(()));

        let order = committing_service(mocks)
            .create_order(req, None)
            .await
            .unwrap();
        assert_eq!(order.customer_id, Some(customer_id));
    }

    #[tokio::test]
    async fn test_failure_after_taking_stock_inserts_nothing() {
        let latte = test_product(Section::Cafe, "4.50", 10);
        let coupon = percent_coupon("SPRING10", "10");

        let mut req = request(FulfillmentMethod::Pickup);
        req.items[0].product_id = latte.id;
        req.coupon_code = Some("SPRING10".into());

        let mut mocks = Mocks::default();
        mocks
            .tx
            .expect_lock_products()
            .returning(move |_| Ok(vec![latte.clone()]));
        mocks
            .tx
            .expect_lock_coupon()
            .returning(move |_| Ok(Some(coupon.clone())));
        mocks
            .tx
            .expect_take_stock()
            .times(1)
            .returning(|_, _| Ok(true));
        mocks.tx.expect_find_user_by_email().returning(|_| Ok(None));
        mocks
            .tx
            .expect_record_coupon_use()
            .times(1)
            .returning(|_| Err(AppError::internal("connection reset")));
        mocks.tx.expect_insert_order().never();

        let result = service(mocks).create_order(req, None).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_rejected_coupon_takes_no_stock() {
        let latte = test_product(Section::Cafe, "4.50", 10);
        let mut expired = percent_coupon("WINTER", "20");
        expired.expires_at = Some(Utc::now() - chrono::Duration::days(1));

        let mut req = request(FulfillmentMethod::Pickup);
        req.items[0].product_id = latte.id;
        req.coupon_code = Some("winter".into());

        let mut mocks = Mocks::default();
        mocks
            .tx
            .expect_lock_products()
            .returning(move |_| Ok(vec![latte.clone()]));
        mocks
            .tx
            .expect_lock_coupon()
            .with(eq("WINTER"))
            .returning(move |_| Ok(Some(expired.clone())));
        mocks.tx.expect_take_stock().never();
        mocks.tx.expect_insert_order().never();

        let result = service(mocks).create_order(req, None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_lost_stock_race_is_insufficient_stock() {
        let roses = test_product(Section::Flowers, "12.99", 5);

        let mut req = request(FulfillmentMethod::Pickup);
        req.items[0].product_id = roses.id;

        let mut mocks = Mocks::default();
        mocks
            .tx
            .expect_lock_products()
            .returning(move |_| Ok(vec![roses.clone()]));
        mocks.tx.expect_take_stock().returning(|_, _| Ok(false));
        mocks.tx.expect_insert_order().never();

        let result = service(mocks).create_order(req, None).await;
        assert!(matches!(result, Err(AppError::InsufficientStock(_))));
    }

    #[tokio::test]
    async fn test_deleted_account_cannot_check_out() {
        let latte = test_product(Section::Cafe, "4.50", 10);
        let mut customer = test_user(UserRole::Customer);
        customer.deleted_at = Some(Utc::now());
        let customer_id = customer.id;

        let mut req = request(FulfillmentMethod::Pickup);
        req.items[0].product_id = latte.id;

        let mut mocks = Mocks::default();
        mocks
            .tx
            .expect_lock_products()
            .returning(move |_| Ok(vec![latte.clone()]));
        mocks.tx.expect_take_stock().returning(|_, _| Ok(true));
        mocks
            .tx
            .expect_find_user_by_id()
            .with(eq(customer_id))
            .returning(move |_| Ok(Some(customer.clone())));
        mocks.tx.expect_insert_order().never();

        let result = service(mocks).create_order(req, Some(customer_id)).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_customer_cancel_returns_stock_for_every_item() {
        let owner = Uuid::new_v4();
        let latte = test_product(Section::Cafe, "4.50", 0);
        let novel = test_product(Section::Books, "18.00", 0);
        let mut order = order_for(Some(owner), OrderStatus::Pending);
        order.items = vec![item(&latte, 2), item(&novel, 1)];
        let id = order.id;

        let mut mocks = Mocks::default();
        let snapshot = order.clone();
        mocks
            .orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(snapshot.clone())));
        mocks
            .tx
            .expect_lock_order()
            .with(eq(id))
            .times(1)
            .returning(move |_| Ok(Some(order.clone())));
        mocks
            .tx
            .expect_return_stock()
            .with(eq(latte.id), eq(2))
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .tx
            .expect_return_stock()
            .with(eq(novel.id), eq(1))
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .tx
            .expect_set_order_status()
            .with(eq(id), eq(OrderStatus::Cancelled))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut cache = MockProductCache::new();
        cache
            .expect_invalidate_products()
            .withf(|ids| ids.len() == 2)
            .times(1)
            .returning(|_| Ok(()));

        let svc = CheckoutManager::new(
            mocks.into_uow(),
            Arc::new(cache),
            Arc::new(MockEmailQueue::new()),
            PricingConfig::default(),
        );
        let cancelled = svc.cancel_for_customer(id, owner).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_rechecks_status_under_lock() {
        let owner = Uuid::new_v4();
        let pending = order_for(Some(owner), OrderStatus::Pending);
        let id = pending.id;
        let mut confirmed = pending.clone();
        confirmed.status = OrderStatus::Confirmed;

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(pending.clone())));
        mocks
            .tx
            .expect_lock_order()
            .returning(move |_| Ok(Some(confirmed.clone())));
        mocks.tx.expect_return_stock().never();
        mocks.tx.expect_set_order_status().never();

        let result = service(mocks).cancel_for_customer(id, owner).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_staff_cancel_returns_stock() {
        let bouquet = test_product(Section::Flowers, "35.00", 1);
        let mut order = order_for(None, OrderStatus::Preparing);
        order.items = vec![item(&bouquet, 3)];
        let id = order.id;

        let mut mocks = Mocks::default();
        let snapshot = order.clone();
        mocks
            .orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(snapshot.clone())));
        mocks
            .tx
            .expect_lock_order()
            .returning(move |_| Ok(Some(order.clone())));
        mocks
            .tx
            .expect_return_stock()
            .with(eq(bouquet.id), eq(3))
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .tx
            .expect_set_order_status()
            .with(eq(id), eq(OrderStatus::Cancelled))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut cache = MockProductCache::new();
        cache.expect_invalidate_products().returning(|_| Ok(()));

        let svc = CheckoutManager::new(
            mocks.into_uow(),
            Arc::new(cache),
            Arc::new(MockEmailQueue::new()),
            PricingConfig::default(),
        );
        let updated = svc.update_status(id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_forward_transition_keeps_stock() {
        let bouquet = test_product(Section::Flowers, "35.00", 1);
        let mut order = order_for(None, OrderStatus::Confirmed);
        order.items = vec![item(&bouquet, 1)];
        let id = order.id;

        let mut mocks = Mocks::default();
        let snapshot = order.clone();
        mocks
            .orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(snapshot.clone())));
        mocks
            .tx
            .expect_lock_order()
            .returning(move |_| Ok(Some(order.clone())));
        mocks.tx.expect_return_stock().never();
        mocks
            .tx
            .expect_set_order_status()
            .with(eq(id), eq(OrderStatus::Preparing))
            .times(1)
            .returning(|_, _| Ok(()));

        let updated = service(mocks)
            .update_status(id, OrderStatus::Preparing)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Preparing);
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_list()
            .withf(|filter, _| filter.status == Some(OrderStatus::Pending))
            .returning(|_, _| Ok((vec![order_for(None, OrderStatus::Pending)], 41)));

        let page = service(mocks)
            .list(
                OrderFilter {
                    status: Some(OrderStatus::Pending),
                },
                PaginationParams {
                    page: 2,
                    per_page: 20,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.meta.total_pages, 3);
    }
}
