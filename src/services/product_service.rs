//! Catalog service: product CRUD, image uploads and the detail cache.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ALLOWED_IMAGE_TYPES, MONEY_SCALE};
use crate::domain::product::slugify;
use crate::domain::{CreateProduct, Product, ProductFilter, UpdateProduct};
use crate::errors::{AppError, AppResult};
use crate::infra::{ObjectStorage, ProductCache, ProductChanges, UnitOfWork};
use crate::types::{Paginated, PaginationParams};
use crate::with_transaction;

#[async_trait]
pub trait ProductService: Send + Sync {
    async fn list(
        &self,
        filter: ProductFilter,
        params: PaginationParams,
    ) -> AppResult<Paginated<Product>>;

    /// Public lookup: only purchasable products are visible.
    async fn get(&self, id: Uuid) -> AppResult<Product>;

    /// Staff lookup, including inactive and deleted products.
    async fn get_any(&self, id: Uuid) -> AppResult<Product>;

    async fn create(&self, input: CreateProduct) -> AppResult<Product>;

    async fn update(&self, id: Uuid, changes: UpdateProduct) -> AppResult<Product>;

    /// Soft delete
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    async fn restore(&self, id: Uuid) -> AppResult<Product>;

    /// Store a new product image and replace the previous one.
    async fn upload_image(
        &self,
        id: Uuid,
        bytes: Vec<u8>,
        content_type: String,
    ) -> AppResult<Product>;
}

pub struct CatalogManager<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Arc<dyn ProductCache>,
    storage: Arc<dyn ObjectStorage>,
    max_image_bytes: usize,
}

impl<U: UnitOfWork> CatalogManager<U> {
    pub fn new(
        uow: Arc<U>,
        cache: Arc<dyn ProductCache>,
        storage: Arc<dyn ObjectStorage>,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            uow,
            cache,
            storage,
            max_image_bytes,
        }
    }

    async fn find(&self, id: Uuid) -> AppResult<Product> {
        self.uow
            .products()
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn unique_slug(&self, name: &str, except: Option<Uuid>) -> AppResult<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::validation("Name must contain letters or digits"));
        }
        if self.uow.products().slug_taken(&slug, except).await? {
            return Err(AppError::conflict("Product slug"));
        }
        Ok(slug)
    }

    /// Cache failures never fail a write.
    async fn forget(&self, id: Uuid) {
        if let Err(e) = self.cache.invalidate_products(&[id]).await {
            tracing::warn!(product_id = %id, error = %e, "Product cache invalidation failed");
        }
    }
}

fn check_name(name: &str) -> AppResult<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > 200 {
        return Err(AppError::validation("Name must be 1-200 characters"));
    }
    Ok(())
}

fn check_price(price: Decimal) -> AppResult<()> {
    if price <= Decimal::ZERO {
        return Err(AppError::validation("Price must be positive"));
    }
    if price.normalize().scale() > MONEY_SCALE {
        return Err(AppError::validation("Price may have at most 2 decimal places"));
    }
    Ok(())
}

fn check_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::validation("Stock cannot be negative"));
    }
    Ok(())
}

/// File extension for an accepted image, checked against the magic bytes.
fn image_extension(content_type: &str, bytes: &[u8]) -> AppResult<&'static str> {
    let ext = ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| content_type.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| AppError::validation("Image must be JPEG, PNG or WebP"))?;

    let matches = match ext {
        "jpg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "png" => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        "webp" => bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
        _ => false,
    };
    if !matches {
        return Err(AppError::validation("Image content does not match its type"));
    }
    Ok(ext)
}

#[async_trait]
impl<U: UnitOfWork> ProductService for CatalogManager<U> {
    async fn list(
        &self,
        filter: ProductFilter,
        params: PaginationParams,
    ) -> AppResult<Paginated<Product>> {
        let (products, total) = self.uow.products().list(&filter, &params).await?;
        Ok(Paginated::new(products, params.page, params.limit(), total))
    }

    async fn get(&self, id: Uuid) -> AppResult<Product> {
        match self.cache.get_product(id).await {
            Ok(Some(product)) if product.is_purchasable() => return Ok(product),
            Ok(_) => {}
            Err(e) => tracing::warn!(product_id = %id, error = %e, "Product cache read failed"),
        }

        let product = self.find(id).await?;
        if !product.is_purchasable() {
            return Err(AppError::NotFound);
        }

        if let Err(e) = self.cache.put_product(&product).await {
            tracing::warn!(product_id = %id, error = %e, "Product cache write failed");
        }
        Ok(product)
    }

    async fn get_any(&self, id: Uuid) -> AppResult<Product> {
        self.find(id).await
    }

    async fn create(&self, input: CreateProduct) -> AppResult<Product> {
        check_name(&input.name)?;
        check_price(input.price)?;
        check_stock(input.stock)?;

        let slug = self.unique_slug(&input.name, None).await?;
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            section: input.section,
            name: input.name.trim().to_string(),
            slug,
            description: input.description,
            price: input.price,
            stock: input.stock,
            image_url: None,
            image_key: None,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let product = self.uow.products().insert(product).await?;
        tracing::info!(product_id = %product.id, section = %product.section, "Product created");
        Ok(product)
    }

    async fn update(&self, id: Uuid, changes: UpdateProduct) -> AppResult<Product> {
        let current = self.find(id).await?;
        if current.deleted_at.is_some() {
            return Err(AppError::NotFound);
        }

        let mut patch = ProductChanges::default();
        if let Some(name) = changes.name {
            check_name(&name)?;
            let name = name.trim().to_string();
            if name != current.name {
                patch.slug = Some(self.unique_slug(&name, Some(id)).await?);
                patch.name = Some(name);
            }
        }
        if let Some(price) = changes.price {
            check_price(price)?;
            patch.price = Some(price);
        }
        if let Some(stock) = changes.stock {
            check_stock(stock)?;
            patch.stock = Some(stock);
        }
        patch.section = changes.section;
        patch.description = changes.description;
        patch.is_active = changes.is_active;

        // Stock is also written by checkouts; set it under the same row lock
        let product = if patch.stock.is_some() {
            with_transaction!(self.uow, |ctx| {
                let locked = ctx.products().lock_many(&[id]).await?;
                if !locked.iter().any(|p| p.deleted_at.is_none()) {
                    return Err(AppError::NotFound);
                }
                ctx.products().update_fields(id, patch).await
            })?
        } else {
            self.uow.products().update_fields(id, patch).await?
        };

        self.forget(id).await;
        Ok(product)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let product = self.find(id).await?;
        if product.deleted_at.is_some() {
            return Err(AppError::NotFound);
        }

        let patch = ProductChanges {
            deleted_at: Some(Some(Utc::now())),
            ..Default::default()
        };
        self.uow.products().update_fields(id, patch).await?;
        self.forget(id).await;

        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> AppResult<Product> {
        let product = self.find(id).await?;
        if product.deleted_at.is_none() {
            return Err(AppError::validation("Product is not deleted"));
        }

        let patch = ProductChanges {
            deleted_at: Some(None),
            ..Default::default()
        };
        let product = self.uow.products().update_fields(id, patch).await?;
        self.forget(id).await;
        Ok(product)
    }

    async fn upload_image(
        &self,
        id: Uuid,
        bytes: Vec<u8>,
        content_type: String,
    ) -> AppResult<Product> {
        if bytes.is_empty() {
            return Err(AppError::validation("Image file is empty"));
        }
        if bytes.len() > self.max_image_bytes {
            return Err(AppError::validation(format!(
                "Image exceeds the {} byte limit",
                self.max_image_bytes
            )));
        }
        let ext = image_extension(&content_type, &bytes)?;

        let product = self.find(id).await?;
        if product.deleted_at.is_some() {
            return Err(AppError::NotFound);
        }

        let key = format!(
            "products/{}/{}/{}.{}",
            product.section,
            product.id,
            Uuid::new_v4().simple(),
            ext
        );
        self.storage.put(&key, bytes, &content_type).await?;

        let previous = product.image_key;
        let patch = ProductChanges {
            image_url: Some(self.storage.public_url(&key)),
            image_key: Some(key.clone()),
            ..Default::default()
        };
        let product = self.uow.products().update_fields(id, patch).await?;
        self.forget(id).await;

        if let Some(old_key) = previous {
            if let Err(e) = self.storage.delete(&old_key).await {
                tracing::warn!(key = %old_key, error = %e, "Previous image was not deleted");
            }
        }

        tracing::info!(product_id = %id, key = %key, "Product image stored");
        Ok(product)
    }
}
