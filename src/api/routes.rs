//! Application route configuration.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, middleware, response::Json, routing::get, Router};
use futures::future::join_all;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    account_routes, admin_order_routes, admin_product_routes, auth_routes, checkout_routes,
    coupon_routes, my_order_routes, product_routes, session_routes, tracking_routes,
};
use super::middleware::{
    auth_middleware, optional_auth_middleware, rate_limit_auth_middleware,
    rate_limit_middleware, require_admin, require_customer, require_staff,
};
use super::openapi::ApiDoc;
use super::AppState;

/// Create the application router with all routes configured.
///
/// Route layers run outermost-last: the rate limit is checked before the
/// token, and the token before the role guard.
pub fn create_router(state: AppState) -> Router {
    let general_limit = || middleware::from_fn_with_state(state.clone(), rate_limit_middleware);
    let authenticated = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    Router::new()
        // Health check endpoints (no rate limiting)
        .route("/", get(root))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public authentication routes (stricter rate limiting)
        .nest(
            "/auth",
            auth_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_auth_middleware,
            )),
        )
        // Public catalog
        .nest("/products", product_routes().route_layer(general_limit()))
        // Checkout and tracking, guests welcome; only checkout looks at a token
        .nest(
            "/orders",
            checkout_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    optional_auth_middleware,
                ))
                .merge(tracking_routes())
                .route_layer(general_limit()),
        )
        // Customer account
        .nest(
            "/me",
            account_routes()
                .route_layer(middleware::from_fn(require_customer))
                .route_layer(authenticated())
                .route_layer(general_limit()),
        )
        .nest(
            "/me/orders",
            my_order_routes()
                .route_layer(middleware::from_fn(require_customer))
                .route_layer(authenticated())
                .route_layer(general_limit()),
        )
        .nest(
            "/me/sessions",
            session_routes()
                .route_layer(authenticated())
                .route_layer(general_limit()),
        )
        // Back office
        .nest(
            "/admin/products",
            admin_product_routes()
                .route_layer(middleware::from_fn(require_staff))
                .route_layer(authenticated())
                .route_layer(general_limit()),
        )
        .nest(
            "/admin/orders",
            admin_order_routes()
                .route_layer(middleware::from_fn(require_staff))
                .route_layer(authenticated())
                .route_layer(general_limit()),
        )
        .nest(
            "/admin/coupons",
            coupon_routes()
                .route_layer(middleware::from_fn(require_admin))
                .route_layer(authenticated())
                .route_layer(general_limit()),
        )
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Storefront API"
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    services: BTreeMap<&'static str, ServiceStatus>,
}

/// Service status
#[derive(Serialize)]
struct ServiceStatus {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint probing every backing service concurrently
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let results = join_all(state.health_checks.iter().map(|probe| async move {
        (probe.component(), probe.check().await)
    }))
    .await;

    let mut services = BTreeMap::new();
    let mut all_healthy = true;

    for (component, result) in results {
        let status = match result {
            Ok(()) => ServiceStatus {
                status: "healthy",
                error: None,
            },
            Err(e) => {
                all_healthy = false;
                tracing::warn!(component, error = %e, "Health check failed");
                ServiceStatus {
                    status: "unhealthy",
                    error: Some(e.to_string()),
                }
            }
        };
        services.insert(component, status);
    }

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        services,
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
