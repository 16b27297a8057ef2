//! Catalog handlers: public browsing and staff management.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::AppState;
use crate::config::{IMAGE_FIELD_NAME, MAX_UPLOAD_BODY_BYTES};
use crate::domain::{CreateProduct, ProductFilter, ProductResponse, UpdateProduct};
use crate::errors::{AppError, AppResult};
use crate::types::{Created, NoContent, PaginationParams, ProductPage};

/// Multipart body of the image upload
#[derive(ToSchema)]
pub struct ImageUpload {
    /// JPEG, PNG or WebP file
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// Public catalog routes
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Staff catalog routes (mounted under /admin/products)
pub fn admin_product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_products).post(create_product))
        .route(
            "/:id",
            get(get_any_product)
                .put(update_product)
                .delete(delete_product),
        )
        .route("/:id/restore", post(restore_product))
        .route(
            "/:id/image",
            post(upload_product_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES)),
        )
}

/// Browse purchasable products
#[utoipa::path(
    get,
    path = "/products",
    tag = "Catalog",
    params(ProductFilter, PaginationParams),
    responses(
        (status = 200, description = "One page of products", body = ProductPage)
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ProductPage>> {
    filter.include_inactive = false;
    let page = state.product_service.list(filter, params).await?;
    Ok(Json(page.map(ProductResponse::from)))
}

/// Product detail
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "Catalog",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Unknown, inactive or deleted product")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    let product = state.product_service.get(id).await?;
    Ok(Json(product.into()))
}

/// Staff listing, including inactive and deleted products
#[utoipa::path(
    get,
    path = "/admin/products",
    tag = "Catalog admin",
    params(ProductFilter, PaginationParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of products", body = ProductPage),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_all_products(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ProductPage>> {
    filter.include_inactive = true;
    let page = state.product_service.list(filter, params).await?;
    Ok(Json(page.map(ProductResponse::from)))
}

#[utoipa::path(
    get,
    path = "/admin/products/{id}",
    tag = "Catalog admin",
    params(("id" = Uuid, Path, description = "Product ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_any_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    let product = state.product_service.get_any(id).await?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "Catalog admin",
    request_body = CreateProduct,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Slug already in use")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProduct>,
) -> AppResult<Created<ProductResponse>> {
    let product = state.product_service.create(payload).await?;
    Ok(Created(product.into()))
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    tag = "Catalog admin",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProduct,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProduct>,
) -> AppResult<Json<ProductResponse>> {
    let product = state.product_service.update(id, payload).await?;
    Ok(Json(product.into()))
}

/// Soft delete a product
#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    tag = "Catalog admin",
    params(("id" = Uuid, Path, description = "Product ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.product_service.delete(id).await?;
    Ok(NoContent)
}

#[utoipa::path(
    post,
    path = "/admin/products/{id}/restore",
    tag = "Catalog admin",
    params(("id" = Uuid, Path, description = "Product ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product restored", body = ProductResponse),
        (status = 400, description = "Product is not deleted")
    )
)]
pub async fn restore_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    let product = state.product_service.restore(id).await?;
    Ok(Json(product.into()))
}

/// Upload or replace the product image
#[utoipa::path(
    post,
    path = "/admin/products/{id}/image",
    tag = "Catalog admin",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body(content = ImageUpload, content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Image stored", body = ProductResponse),
        (status = 400, description = "Missing, oversized or unsupported image"),
        (status = 502, description = "Object storage unavailable")
    )
)]
pub async fn upload_product_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<ProductResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD_NAME) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Image content type is required"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;

        let product = state
            .product_service
            .upload_image(id, bytes.to_vec(), content_type)
            .await?;
        return Ok(Json(product.into()));
    }

    Err(AppError::validation(format!(
        "Multipart field '{}' is required",
        IMAGE_FIELD_NAME
    )))
}
