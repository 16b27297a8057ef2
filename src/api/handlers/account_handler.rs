//! Signed-in account: profile, password, sessions and saved addresses.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{Address, AddressInput, UpdateProfile, UserResponse};
use crate::errors::AppResult;
use crate::types::{Created, MessageResponse, NoContent};

/// Password change request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

/// Customer account routes (mounted under /me)
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_profile).patch(update_profile).delete(delete_account),
        )
        .route("/password", put(change_password))
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/:id",
            put(update_address).delete(delete_address),
        )
        .route("/addresses/:id/default", post(set_default_address))
}

/// Session routes open to every role (mounted under /me/sessions)
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/", delete(logout_everywhere))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current profile", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    let profile = state.customer_service.get_profile(user.id).await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    patch,
    path = "/me",
    tag = "Account",
    request_body = UpdateProfile,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfile>,
) -> AppResult<Json<UserResponse>> {
    let profile = state
        .customer_service
        .update_profile(user.id, payload)
        .await?;
    Ok(Json(profile.into()))
}

/// Close the account. Past orders are kept.
#[utoipa::path(
    delete,
    path = "/me",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Account closed")
    )
)]
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<NoContent> {
    state.customer_service.delete_account(user.id).await?;
    Ok(NoContent)
}

/// Change the password; every session ends
#[utoipa::path(
    put,
    path = "/me/password",
    tag = "Account",
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .customer_service
        .change_password(user.id, payload.current_password, payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

#[utoipa::path(
    delete,
    path = "/me/sessions",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All sessions ended", body = MessageResponse)
    )
)]
pub async fn logout_everywhere(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<MessageResponse>> {
    let ended = state.auth_service.logout_all(user.id).await?;
    Ok(Json(MessageResponse::new(format!("Ended {} sessions", ended))))
}

#[utoipa::path(
    get,
    path = "/me/addresses",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Saved addresses, default first", body = [Address])
    )
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<Address>>> {
    let addresses = state.address_service.list(user.id).await?;
    Ok(Json(addresses))
}

#[utoipa::path(
    post,
    path = "/me/addresses",
    tag = "Account",
    request_body = AddressInput,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Address saved", body = Address),
        (status = 400, description = "Validation error")
    )
)]
pub async fn create_address(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<AddressInput>,
) -> AppResult<Created<Address>> {
    let address = state.address_service.create(user.id, payload).await?;
    Ok(Created(address))
}

#[utoipa::path(
    put,
    path = "/me/addresses/{id}",
    tag = "Account",
    params(("id" = Uuid, Path, description = "Address ID")),
    request_body = AddressInput,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Address updated", body = Address),
        (status = 404, description = "Address not found")
    )
)]
pub async fn update_address(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AddressInput>,
) -> AppResult<Json<Address>> {
    let address = state.address_service.update(user.id, id, payload).await?;
    Ok(Json(address))
}

#[utoipa::path(
    delete,
    path = "/me/addresses/{id}",
    tag = "Account",
    params(("id" = Uuid, Path, description = "Address ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "Address not found")
    )
)]
pub async fn delete_address(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.address_service.delete(user.id, id).await?;
    Ok(NoContent)
}

#[utoipa::path(
    post,
    path = "/me/addresses/{id}/default",
    tag = "Account",
    params(("id" = Uuid, Path, description = "Address ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Default address changed", body = Address),
        (status = 404, description = "Address not found")
    )
)]
pub async fn set_default_address(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Address>> {
    let address = state.address_service.set_default(user.id, id).await?;
    Ok(Json(address))
}
