//! Checkout, guest tracking, order history and staff order management.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, patch, post},
    Extension, Router,
};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{CreateOrder, Order, OrderFilter, OrderTracking, TrackOrderQuery, UpdateOrderStatus};
use crate::errors::AppResult;
use crate::types::{Created, OrderPage, PaginationParams};

/// Checkout (mounted under /orders behind optional auth)
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(create_order))
}

/// Guest tracking (mounted under /orders, never reads a token)
pub fn tracking_routes() -> Router<AppState> {
    Router::new().route("/track", get(track_order))
}

/// Signed-in customer's history (mounted under /me/orders)
pub fn my_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/:id", get(get_my_order))
        .route("/:id/cancel", post(cancel_my_order))
}

/// Staff order management (mounted under /admin/orders)
pub fn admin_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_order_status))
}

/// Place an order as a guest or signed-in customer.
///
/// Prices, tax, shipping and discount are computed server-side.
#[utoipa::path(
    post,
    path = "/orders",
    tag = "Orders",
    request_body = CreateOrder,
    security((), ("bearer_auth" = [])),
    responses(
        (status = 201, description = "Order placed", body = Order),
        (status = 400, description = "Validation error or rejected coupon"),
        (status = 401, description = "Invalid bearer token"),
        (status = 409, description = "Insufficient stock"),
        (status = 422, description = "Product unavailable")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    ValidatedJson(payload): ValidatedJson<CreateOrder>,
) -> AppResult<Created<Order>> {
    // Staff accounts check out like guests
    let customer_id = user
        .filter(|Extension(u)| u.is_customer())
        .map(|Extension(u)| u.id);

    let order = state.order_service.create_order(payload, customer_id).await?;
    Ok(Created(order))
}

/// Track an order with its number and email
#[utoipa::path(
    get,
    path = "/orders/track",
    tag = "Orders",
    params(TrackOrderQuery),
    responses(
        (status = 200, description = "Order status", body = OrderTracking),
        (status = 404, description = "No order with this number and email")
    )
)]
pub async fn track_order(
    State(state): State<AppState>,
    Query(query): Query<TrackOrderQuery>,
) -> AppResult<Json<OrderTracking>> {
    let tracking = state.order_service.track(query).await?;
    Ok(Json(tracking))
}

#[utoipa::path(
    get,
    path = "/me/orders",
    tag = "Account",
    params(PaginationParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order history", body = OrderPage)
    )
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<OrderPage>> {
    let page = state
        .order_service
        .list_for_customer(user.id, params)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/me/orders/{id}",
    tag = "Account",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_my_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = state.order_service.get_for_customer(id, user.id).await?;
    Ok(Json(order))
}

/// Cancel a pending order; its stock is returned
#[utoipa::path(
    post,
    path = "/me/orders/{id}/cancel",
    tag = "Account",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order cancelled", body = Order),
        (status = 400, description = "Order is no longer pending"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn cancel_my_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = state.order_service.cancel_for_customer(id, user.id).await?;
    Ok(Json(order))
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    tag = "Orders admin",
    params(OrderFilter, PaginationParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of orders", body = OrderPage),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<OrderPage>> {
    let page = state.order_service.list(filter, params).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/admin/orders/{id}",
    tag = "Orders admin",
    params(("id" = Uuid, Path, description = "Order ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = state.order_service.get(id).await?;
    Ok(Json(order))
}

/// Move an order along its lifecycle
#[utoipa::path(
    patch,
    path = "/admin/orders/{id}/status",
    tag = "Orders admin",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatus,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Status changed", body = Order),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatus>,
) -> AppResult<Json<Order>> {
    let order = state.order_service.update_status(id, payload.status).await?;
    Ok(Json(order))
}
