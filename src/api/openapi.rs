//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    account_handler, auth_handler, coupon_handler, order_handler, product_handler,
};
use crate::domain::{
    Address, AddressInput, CartLine, Coupon, CouponKind, CreateCoupon, CreateOrder,
    CreateProduct, FulfillmentMethod, Order, OrderItem, OrderStatus, OrderTracking,
    ProductResponse, Section, ShippingAddress, TrackedItem, UpdateOrderStatus, UpdateProduct,
    UpdateProfile, UserResponse, UserRole,
};
use crate::services::TokenResponse;
use crate::types::{CouponPage, MessageResponse, OrderPage, PaginationMeta, ProductPage};

/// OpenAPI documentation for the storefront
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = "Cafe, flower and book shop backend: catalog, checkout, accounts and back office",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        auth_handler::register,
        auth_handler::login,
        auth_handler::refresh,
        auth_handler::logout,
        product_handler::list_products,
        product_handler::get_product,
        product_handler::list_all_products,
        product_handler::get_any_product,
        product_handler::create_product,
        product_handler::update_product,
        product_handler::delete_product,
        product_handler::restore_product,
        product_handler::upload_product_image,
        order_handler::create_order,
        order_handler::track_order,
        order_handler::list_my_orders,
        order_handler::get_my_order,
        order_handler::cancel_my_order,
        order_handler::list_orders,
        order_handler::get_order,
        order_handler::update_order_status,
        account_handler::get_profile,
        account_handler::update_profile,
        account_handler::delete_account,
        account_handler::change_password,
        account_handler::logout_everywhere,
        account_handler::list_addresses,
        account_handler::create_address,
        account_handler::update_address,
        account_handler::delete_address,
        account_handler::set_default_address,
        coupon_handler::list_coupons,
        coupon_handler::create_coupon,
        coupon_handler::deactivate_coupon,
    ),
    components(
        schemas(
            UserRole,
            UserResponse,
            UpdateProfile,
            Address,
            AddressInput,
            ShippingAddress,
            Section,
            ProductResponse,
            CreateProduct,
            UpdateProduct,
            CartLine,
            CreateOrder,
            FulfillmentMethod,
            Order,
            OrderItem,
            OrderStatus,
            OrderTracking,
            TrackedItem,
            UpdateOrderStatus,
            Coupon,
            CouponKind,
            CreateCoupon,
            TokenResponse,
            MessageResponse,
            PaginationMeta,
            ProductPage,
            OrderPage,
            CouponPage,
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            auth_handler::RefreshRequest,
            account_handler::ChangePasswordRequest,
            product_handler::ImageUpload,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and token rotation"),
        (name = "Catalog", description = "Public product browsing"),
        (name = "Orders", description = "Checkout and guest tracking"),
        (name = "Account", description = "Profile, addresses and order history"),
        (name = "Catalog admin", description = "Staff product management"),
        (name = "Orders admin", description = "Staff order management"),
        (name = "Coupons", description = "Admin coupon management")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
