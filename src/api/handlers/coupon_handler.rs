//! Admin coupon management.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get},
    Router,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{Coupon, CreateCoupon};
use crate::errors::AppResult;
use crate::types::{CouponPage, Created, PaginationParams};

/// Coupon routes (mounted under /admin/coupons)
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/:id", delete(deactivate_coupon))
}

#[utoipa::path(
    get,
    path = "/admin/coupons",
    tag = "Coupons",
    params(PaginationParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of coupons", body = CouponPage),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<CouponPage>> {
    let page = state.coupon_service.list(params).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/admin/coupons",
    tag = "Coupons",
    request_body = CreateCoupon,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Coupon created", body = Coupon),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Code already exists")
    )
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CreateCoupon>,
) -> AppResult<Created<Coupon>> {
    let coupon = state.coupon_service.create(payload).await?;
    Ok(Created(coupon))
}

/// Deactivate a coupon; orders that used it keep their discount
#[utoipa::path(
    delete,
    path = "/admin/coupons/{id}",
    tag = "Coupons",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coupon deactivated", body = Coupon),
        (status = 404, description = "Coupon not found")
    )
)]
pub async fn deactivate_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Coupon>> {
    let coupon = state.coupon_service.deactivate(id).await?;
    Ok(Json(coupon))
}
