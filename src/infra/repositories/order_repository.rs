//! Order repository. Orders are read with their items attached.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::base::fetch_page;
use super::entities::{order, order_item};
use crate::domain::{Order, OrderFilter, OrderItem, OrderStatus, ShippingAddress};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn find_by_number(&self, order_number: &str) -> AppResult<Option<Order>>;

    async fn list_for_customer(
        &self,
        customer_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)>;

    async fn list(
        &self,
        filter: &OrderFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)>;
}

pub struct OrderStore {
    db: DatabaseConnection,
}

impl OrderStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderRepository for OrderStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        let header = order::Entity::find_by_id(id).one(&self.db).await?;
        load_one(&self.db, header).await
    }

    async fn find_by_number(&self, order_number: &str) -> AppResult<Option<Order>> {
        let header = order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&self.db)
            .await?;
        load_one(&self.db, header).await
    }

    async fn list_for_customer(
        &self,
        customer_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)> {
        let select = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt);
        let (headers, total) = fetch_page(select, &self.db, params).await?;
        Ok((attach_items(&self.db, headers).await?, total))
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)> {
        let mut select = order::Entity::find();
        if let Some(status) = filter.status {
            select = select.filter(order::Column::Status.eq(status.as_str()));
        }
        let select = select.order_by_desc(order::Column::CreatedAt);
        let (headers, total) = fetch_page(select, &self.db, params).await?;
        Ok((attach_items(&self.db, headers).await?, total))
    }
}

/// Insert the order header and all of its items.
pub(crate) async fn insert<C: ConnectionTrait>(db: &C, order: &Order) -> AppResult<()> {
    let shipping_address = order
        .shipping_address
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::internal(format!("Address serialization error: {}", e)))?;

    order::ActiveModel {
        id: Set(order.id),
        order_number: Set(order.order_number.clone()),
        customer_id: Set(order.customer_id),
        is_guest: Set(order.is_guest),
        email: Set(order.email.clone()),
        name: Set(order.name.clone()),
        phone: Set(order.phone.clone()),
        status: Set(order.status.as_str().to_string()),
        fulfillment: Set(order.fulfillment.as_str().to_string()),
        shipping_address: Set(shipping_address),
        notes: Set(order.notes.clone()),
        coupon_code: Set(order.coupon_code.clone()),
        subtotal: Set(order.subtotal),
        discount: Set(order.discount),
        tax: Set(order.tax),
        shipping: Set(order.shipping),
        total: Set(order.total),
        created_at: Set(order.created_at),
        updated_at: Set(order.updated_at),
    }
    .insert(db)
    .await?;

    let items = order.items.iter().map(|item| order_item::ActiveModel {
        id: Set(item.id),
        order_id: Set(order.id),
        product_id: Set(item.product_id),
        product_name: Set(item.product_name.clone()),
        section: Set(item.section.as_str().to_string()),
        unit_price: Set(item.unit_price),
        quantity: Set(item.quantity),
        line_total: Set(item.line_total),
    });
    order_item::Entity::insert_many(items).exec(db).await?;

    Ok(())
}

/// Load an order and lock its header row.
pub(crate) async fn lock_one<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<Order>> {
    let header = order::Entity::find_by_id(id)
        .lock_exclusive()
        .one(db)
        .await?;
    load_one(db, header).await
}

pub(crate) async fn set_status<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    status: OrderStatus,
) -> AppResult<()> {
    order::Entity::update_many()
        .col_expr(order::Column::Status, Expr::value(status.as_str()))
        .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(order::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

async fn load_one<C: ConnectionTrait>(
    db: &C,
    header: Option<order::Model>,
) -> AppResult<Option<Order>> {
    match header {
        Some(header) => Ok(attach_items(db, vec![header]).await?.pop()),
        None => Ok(None),
    }
}

async fn attach_items<C: ConnectionTrait>(
    db: &C,
    headers: Vec<order::Model>,
) -> AppResult<Vec<Order>> {
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
    let rows = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::ProductName)
        .all(db)
        .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        by_order.entry(row.order_id).or_default().push(OrderItem::from(row));
    }

    headers
        .into_iter()
        .map(|header| {
            let items = by_order.remove(&header.id).unwrap_or_default();
            into_order(header, items)
        })
        .collect()
}

fn into_order(model: order::Model, items: Vec<OrderItem>) -> AppResult<Order> {
    let shipping_address = model
        .shipping_address
        .map(serde_json::from_value::<ShippingAddress>)
        .transpose()
        .map_err(|e| AppError::internal(format!("Stored address is invalid: {}", e)))?;

    Ok(Order {
        id: model.id,
        order_number: model.order_number,
        customer_id: model.customer_id,
        is_guest: model.is_guest,
        email: model.email,
        name: model.name,
        phone: model.phone,
        status: model.status.parse()?,
        fulfillment: model.fulfillment.parse()?,
        shipping_address,
        notes: model.notes,
        coupon_code: model.coupon_code,
        subtotal: model.subtotal,
        discount: model.discount,
        tax: model.tax,
        shipping: model.shipping,
        total: model.total,
        items,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}
