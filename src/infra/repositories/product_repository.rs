//! Product catalog repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Unchanged,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::base::fetch_page;
use super::entities::product::{self, ActiveModel, Entity as ProductEntity};
use crate::domain::{Product, ProductFilter, Section};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Find by id, including inactive and soft-deleted products.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn list(
        &self,
        filter: &ProductFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Product>, u64)>;

    /// True when another product already uses `slug`.
    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> AppResult<bool>;

    async fn insert(&self, product: Product) -> AppResult<Product>;

    /// Write only the columns set in `changes`.
    async fn update_fields(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product>;
}

/// Column updates for one product row. `None` leaves a column as stored;
/// `updated_at` is always refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub section: Option<Section>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    /// Absolute stock level. Only written under a row lock.
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub image_key: Option<String>,
    pub is_active: Option<bool>,
    /// `Some(None)` restores a soft-deleted product.
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

pub struct ProductStore {
    db: DatabaseConnection,
}

impl ProductStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for ProductStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        let model = ProductEntity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Product::from))
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut select = ProductEntity::find();

        if !filter.include_inactive {
            select = select
                .filter(product::Column::IsActive.eq(true))
                .filter(product::Column::DeletedAt.is_null());
        }
        if let Some(section) = filter.section {
            select = select.filter(product::Column::Section.eq(section.as_str()));
        }
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q.to_lowercase());
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Name))).like(pattern),
            );
        }

        let select = select
            .order_by_asc(product::Column::Section)
            .order_by_asc(product::Column::Name);
        let (models, total) = fetch_page(select, &self.db, params).await?;

        Ok((models.into_iter().map(Product::from).collect(), total))
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> AppResult<bool> {
        let mut select = ProductEntity::find().filter(product::Column::Slug.eq(slug));
        if let Some(id) = except {
            select = select.filter(product::Column::Id.ne(id));
        }
        Ok(select.count(&self.db).await? > 0)
    }

    async fn insert(&self, product: Product) -> AppResult<Product> {
        let model = ActiveModel {
            id: Set(product.id),
            section: Set(product.section.as_str().to_string()),
            name: Set(product.name),
            slug: Set(product.slug),
            description: Set(product.description),
            price: Set(product.price),
            stock: Set(product.stock),
            image_url: Set(product.image_url),
            image_key: Set(product.image_key),
            is_active: Set(product.is_active),
            created_at: Set(product.created_at),
            updated_at: Set(product.updated_at),
            deleted_at: Set(product.deleted_at),
        }
        .insert(&self.db)
        .await?;

        Ok(Product::from(model))
    }

    async fn update_fields(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product> {
        update_fields(&self.db, id, changes).await
    }
}

/// Load products and take row locks until the surrounding transaction ends.
pub(crate) async fn lock_many<C: ConnectionTrait>(db: &C, ids: &[Uuid]) -> AppResult<Vec<Product>> {
    let models = ProductEntity::find()
        .filter(product::Column::Id.is_in(ids.to_vec()))
        .order_by_asc(product::Column::Id)
        .lock_exclusive()
        .all(db)
        .await?;
    Ok(models.into_iter().map(Product::from).collect())
}

pub(crate) async fn update_fields<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    changes: ProductChanges,
) -> AppResult<Product> {
    let mut active = ActiveModel {
        id: Unchanged(id),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    if let Some(section) = changes.section {
        active.section = Set(section.as_str().to_string());
    }
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(slug) = changes.slug {
        active.slug = Set(slug);
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = changes.price {
        active.price = Set(price);
    }
    if let Some(stock) = changes.stock {
        active.stock = Set(stock);
    }
    if let Some(image_url) = changes.image_url {
        active.image_url = Set(Some(image_url));
    }
    if let Some(image_key) = changes.image_key {
        active.image_key = Set(Some(image_key));
    }
    if let Some(is_active) = changes.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(deleted_at) = changes.deleted_at {
        active.deleted_at = Set(deleted_at);
    }

    let model = active.update(db).await.map_err(|e| match e {
        DbErr::RecordNotUpdated => AppError::NotFound,
        other => AppError::from(other),
    })?;
    Ok(Product::from(model))
}

/// Guarded decrement: `false` when the row no longer has `quantity` in stock.
pub(crate) async fn take_stock<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    quantity: i32,
) -> AppResult<bool> {
    let result = ProductEntity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(product::Column::Id.eq(id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

pub(crate) async fn return_stock<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    ProductEntity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(product::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}
