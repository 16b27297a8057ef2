//! JWT authentication middleware and role guards.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::config::BEARER_TOKEN_PREFIX;
use crate::domain::UserRole;
use crate::errors::AppError;

/// Authenticated user extracted from JWT token
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_customer(&self) -> bool {
        self.role == UserRole::Customer
    }
}

/// Bearer token from the Authorization header. `Ok(None)` when the header
/// is absent; a present but malformed header is an error.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix(BEARER_TOKEN_PREFIX))
        .map(Some)
        .ok_or(AppError::Unauthorized)
}

fn authenticate(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let claims = state.auth_service.verify_token(token)?;
    Ok(CurrentUser {
        id: claims.sub,
        role: claims.role(),
        email: claims.email,
    })
}

/// JWT authentication middleware.
///
/// Extracts and validates the JWT token from the Authorization header,
/// then injects the CurrentUser into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?.ok_or(AppError::Unauthorized)?;
    let current_user = authenticate(&state, token)?;

    request.extensions_mut().insert(current_user);
    Ok(next.run(request).await)
}

/// Like `auth_middleware`, but anonymous requests pass through.
///
/// A token that is present but invalid is still rejected, so an expired
/// session never silently turns into a guest checkout.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(request.headers())? {
        let current_user = authenticate(&state, token)?;
        request.extensions_mut().insert(current_user);
    }
    Ok(next.run(request).await)
}

fn current_user(request: &Request) -> Result<&CurrentUser, AppError> {
    request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)
}

/// Customer-only routes (profile, addresses, order history).
pub async fn require_customer(request: Request, next: Next) -> Result<Response, AppError> {
    if !current_user(&request)?.is_customer() {
        return Err(AppError::Forbidden);
    }
    Ok(next.run(request).await)
}

/// Staff and admins.
pub async fn require_staff(request: Request, next: Next) -> Result<Response, AppError> {
    if !current_user(&request)?.is_staff() {
        return Err(AppError::Forbidden);
    }
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    if !current_user(&request)?.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Ok(None)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(matches!(bearer_token(&headers), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_role_helpers() {
        let user = |role| CurrentUser {
            id: Uuid::nil(),
            email: "a@example.com".into(),
            role,
        };
        assert!(user(UserRole::Admin).is_staff());
        assert!(!user(UserRole::Staff).is_admin());
        assert!(user(UserRole::Customer).is_customer());
        assert!(!user(UserRole::Staff).is_customer());
    }
}
