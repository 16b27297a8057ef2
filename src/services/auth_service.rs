//! Authentication service: accounts, token issuance and refresh rotation.
//!
//! Access tokens are short-lived JWTs. Refresh tokens are JWTs signed with a
//! separate secret whose `jti` names a row in the session table; redeeming a
//! refresh token deletes that row and issues a new pair. A refresh token whose
//! row is already gone is treated as stolen and ends every session of its
//! subject.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{
    Config, SECONDS_PER_MINUTE, TOKEN_KIND_ACCESS, TOKEN_KIND_REFRESH, TOKEN_TYPE_BEARER,
};
use crate::domain::{normalize_email, Password, RefreshSession, SessionMeta, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{NewUser, UnitOfWork};

/// JWT claims payload shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    /// `access` or `refresh`
    pub typ: String,
    /// Token id. For refresh tokens this is the session row id.
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.as_str())
    }
}

/// Token pair returned after login or refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub expires_in: i64,
    /// Refresh token lifetime in seconds
    #[schema(example = 604800)]
    pub refresh_expires_in: i64,
}

/// Self-registration input
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new customer account
    async fn register(&self, registration: Registration) -> AppResult<User>;

    async fn login(&self, email: String, password: String, meta: SessionMeta)
        -> AppResult<TokenResponse>;

    /// Redeem a refresh token for a new pair
    async fn refresh(&self, refresh_token: &str, meta: SessionMeta) -> AppResult<TokenResponse>;

    /// End the session behind `refresh_token`. Repeating it is harmless.
    async fn logout(&self, refresh_token: &str) -> AppResult<()>;

    /// End every session of `user_id`
    async fn logout_all(&self, user_id: Uuid) -> AppResult<u64>;

    /// Verify an access token and return its claims
    fn verify_token(&self, token: &str) -> AppResult<Claims>;

    async fn purge_expired_sessions(&self) -> AppResult<u64>;

    /// Create a staff or admin account (CLI only)
    async fn create_admin(
        &self,
        email: String,
        password: String,
        name: String,
        role: UserRole,
    ) -> AppResult<User>;
}

pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    config: Config,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(uow: Arc<U>, config: Config) -> Self {
        Self { uow, config }
    }

    async fn create_account(&self, new_user: NewUser) -> AppResult<User> {
        // Soft-deleted accounts keep their email reserved
        if self.uow.users().email_taken(&new_user.email).await? {
            return Err(AppError::conflict("Email"));
        }
        let user = self.uow.users().create(new_user).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    /// Issue a token pair, record its session and enforce the session cap.
    async fn issue_tokens(&self, user: &User, meta: SessionMeta) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let access_ttl = Duration::minutes(self.config.access_token_ttl_minutes);
        let refresh_ttl = Duration::days(self.config.refresh_token_ttl_days);

        let access_token = encode_token(
            user,
            TOKEN_KIND_ACCESS,
            Uuid::new_v4(),
            now,
            now + access_ttl,
            self.config.jwt_secret_bytes(),
        )?;

        let session = RefreshSession {
            id: Uuid::new_v4(),
            user_id: user.id,
            expires_at: now + refresh_ttl,
            created_at: now,
            user_agent: meta.user_agent,
            ip: meta.ip,
        };
        let refresh_token = encode_token(
            user,
            TOKEN_KIND_REFRESH,
            session.id,
            now,
            session.expires_at,
            self.config.jwt_refresh_secret_bytes(),
        )?;

        let sessions = self.uow.sessions();
        sessions.create(session).await?;
        let pruned = sessions
            .prune_oldest(user.id, self.config.max_sessions_per_user)
            .await?;
        if pruned > 0 {
            tracing::debug!(user_id = %user.id, pruned, "Oldest sessions pruned");
        }

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.config.access_token_ttl_minutes * SECONDS_PER_MINUTE,
            refresh_expires_in: refresh_ttl.num_seconds(),
        })
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn register(&self, registration: Registration) -> AppResult<User> {
        let password_hash = Password::new(&registration.password)?.into_string();
        self.create_account(NewUser {
            email: normalize_email(&registration.email),
            password_hash,
            name: registration.name.trim().to_string(),
            phone: registration.phone.filter(|p| !p.trim().is_empty()),
            role: UserRole::Customer,
        })
        .await
    }

    async fn login(
        &self,
        email: String,
        password: String,
        meta: SessionMeta,
    ) -> AppResult<TokenResponse> {
        let user = self.uow.users().find_by_email(&normalize_email(&email)).await?;

        // Unknown emails still pay for one hash verification
        let stored = match &user {
            Some(user) => Password::from_hash(user.password_hash.clone()),
            None => Password::dummy(),
        };
        let password_valid = stored.verify(&password);

        let user = match user {
            Some(user) if password_valid => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        tracing::info!(user_id = %user.id, "Login succeeded");
        self.issue_tokens(&user, meta).await
    }

    async fn refresh(&self, refresh_token: &str, meta: SessionMeta) -> AppResult<TokenResponse> {
        let claims = decode_token(
            refresh_token,
            TOKEN_KIND_REFRESH,
            self.config.jwt_refresh_secret_bytes(),
            true,
        )?;

        let sessions = self.uow.sessions();
        if !sessions.consume(claims.jti, claims.sub).await? {
            let revoked = sessions.delete_all_for_user(claims.sub).await?;
            tracing::warn!(
                user_id = %claims.sub,
                session_id = %claims.jti,
                revoked,
                "Refresh token reuse detected, all sessions revoked"
            );
            return Err(AppError::TokenReuse);
        }

        let user = self
            .uow
            .users()
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        self.issue_tokens(&user, meta).await
    }

    async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        // An expired token still names a row worth deleting
        let claims = decode_token(
            refresh_token,
            TOKEN_KIND_REFRESH,
            self.config.jwt_refresh_secret_bytes(),
            false,
        )?;
        self.uow.sessions().consume(claims.jti, claims.sub).await?;
        Ok(())
    }

    async fn logout_all(&self, user_id: Uuid) -> AppResult<u64> {
        let revoked = self.uow.sessions().delete_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        decode_token(
            token,
            TOKEN_KIND_ACCESS,
            self.config.jwt_secret_bytes(),
            true,
        )
    }

    async fn purge_expired_sessions(&self) -> AppResult<u64> {
        let purged = self.uow.sessions().purge_expired(Utc::now()).await?;
        if purged > 0 {
            tracing::info!(purged, "Expired sessions purged");
        }
        Ok(purged)
    }

    async fn create_admin(
        &self,
        email: String,
        password: String,
        name: String,
        role: UserRole,
    ) -> AppResult<User> {
        if role == UserRole::Customer {
            return Err(AppError::validation("Role must be staff or admin"));
        }
        let password_hash = Password::new(&password)?.into_string();
        self.create_account(NewUser {
            email: normalize_email(&email),
            password_hash,
            name: name.trim().to_string(),
            phone: None,
            role,
        })
        .await
    }
}

fn encode_token(
    user: &User,
    kind: &str,
    jti: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    secret: &[u8],
) -> AppResult<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        typ: kind.to_string(),
        jti,
        exp: expires_at.timestamp(),
        iat: issued_at.timestamp(),
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

fn decode_token(token: &str, kind: &str, secret: &[u8], check_expiry: bool) -> AppResult<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = check_expiry;

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?.claims;
    if claims.typ != kind {
        return Err(AppError::Unauthorized);
    }
    Ok(claims)
}
