//! Application settings loaded from environment variables.

use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::constants::{
    DEFAULT_ACCESS_TOKEN_TTL_MINUTES, DEFAULT_DATABASE_URL, DEFAULT_FREE_SHIPPING_THRESHOLD,
    DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_SESSIONS_PER_USER, DEFAULT_REDIS_URL,
    DEFAULT_REFRESH_TOKEN_TTL_DAYS, DEFAULT_S3_BUCKET, DEFAULT_S3_REGION,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_SESSION_CLEANUP_INTERVAL_MINUTES,
    DEFAULT_SHIPPING_FLAT_FEE, DEFAULT_TAX_RATE, MIN_JWT_SECRET_LENGTH,
};

/// Object storage settings (S3 or any S3-compatible store)
#[derive(Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint: Option<String>,
    /// Base URL used to build public image links
    pub public_url: Option<String>,
    pub max_image_bytes: usize,
}

/// Checkout pricing rules
#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub tax_rate: Decimal,
    pub shipping_flat_fee: Decimal,
    pub free_shipping_threshold: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: parse_decimal(DEFAULT_TAX_RATE),
            shipping_flat_fee: parse_decimal(DEFAULT_SHIPPING_FLAT_FEE),
            free_shipping_threshold: parse_decimal(DEFAULT_FREE_SHIPPING_THRESHOLD),
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    jwt_secret: String,
    jwt_refresh_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub max_sessions_per_user: u64,
    pub pricing: PricingConfig,
    pub storage: StorageConfig,
    pub session_cleanup_interval_minutes: u64,
    pub server_host: String,
    pub server_port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_refresh_secret", &"[REDACTED]")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("max_sessions_per_user", &self.max_sessions_per_user)
            .field("pricing", &self.pricing)
            .field("s3_bucket", &self.storage.bucket)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT_SECRET is not set or is too short (security requirement).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                // Development mode: use default but warn
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let jwt_refresh_secret =
            env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| format!("{}:refresh", jwt_secret));

        if jwt_refresh_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_REFRESH_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let pricing = PricingConfig {
            tax_rate: env_decimal("TAX_RATE", DEFAULT_TAX_RATE),
            shipping_flat_fee: env_decimal("SHIPPING_FLAT_FEE", DEFAULT_SHIPPING_FLAT_FEE),
            free_shipping_threshold: env_decimal(
                "FREE_SHIPPING_THRESHOLD",
                DEFAULT_FREE_SHIPPING_THRESHOLD,
            ),
        };

        let storage = StorageConfig {
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| DEFAULT_S3_BUCKET.to_string()),
            region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            public_url: env::var("S3_PUBLIC_URL").ok().filter(|v| !v.is_empty()),
            max_image_bytes: env_parse("MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES),
        };

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            jwt_secret,
            jwt_refresh_secret,
            access_token_ttl_minutes: env_parse(
                "ACCESS_TOKEN_TTL_MINUTES",
                DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            ),
            refresh_token_ttl_days: env_parse(
                "REFRESH_TOKEN_TTL_DAYS",
                DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            ),
            max_sessions_per_user: env_parse(
                "MAX_SESSIONS_PER_USER",
                DEFAULT_MAX_SESSIONS_PER_USER,
            )
            .max(1),
            pricing,
            storage,
            session_cleanup_interval_minutes: env_parse(
                "SESSION_CLEANUP_INTERVAL_MINUTES",
                DEFAULT_SESSION_CLEANUP_INTERVAL_MINUTES,
            ),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: env_parse("SERVER_PORT", DEFAULT_SERVER_PORT),
        }
    }

    /// Deterministic configuration for unit and integration tests.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_tests() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            jwt_secret: "test-secret-key-for-testing-only-32chars".to_string(),
            jwt_refresh_secret: "test-refresh-secret-for-testing-only-32ch".to_string(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            max_sessions_per_user: DEFAULT_MAX_SESSIONS_PER_USER,
            pricing: PricingConfig::default(),
            storage: StorageConfig {
                bucket: DEFAULT_S3_BUCKET.to_string(),
                region: DEFAULT_S3_REGION.to_string(),
                endpoint: None,
                public_url: Some("https://cdn.example.com".to_string()),
                max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            },
            session_cleanup_interval_minutes: DEFAULT_SESSION_CLEANUP_INTERVAL_MINUTES,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }

    /// Get JWT secret bytes for access token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Get JWT secret bytes for refresh token signing/verification.
    pub fn jwt_refresh_secret_bytes(&self) -> &[u8] {
        self.jwt_refresh_secret.as_bytes()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: &str) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|v| Decimal::from_str(&v).ok())
        .unwrap_or_else(|| parse_decimal(default))
}

/// Parse one of the compile-time decimal defaults.
fn parse_decimal(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or(Decimal::ZERO)
}
