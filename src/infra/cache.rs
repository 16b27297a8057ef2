//! Redis cache implementation.
//!
//! JSON values with TTL, the product detail cache and fixed-window rate
//! limiting, all over a shared `ConnectionManager`.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::config::{
    Config, CACHE_PREFIX_PRODUCT, CACHE_PREFIX_RATE_LIMIT, PRODUCT_CACHE_TTL_SECONDS,
};
use crate::domain::Product;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Product detail cache as seen by the catalog and checkout services.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ProductCache: Send + Sync {
    async fn get_product(&self, product_id: Uuid) -> AppResult<Option<Product>>;

    async fn put_product(&self, product: &Product) -> AppResult<()>;

    async fn invalidate_products(&self, product_ids: &[Uuid]) -> AppResult<()>;
}

/// Fixed-window request counter used by the rate limiting middleware.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a hit for `identifier`. Returns (current_count, is_allowed).
    async fn hit(&self, identifier: &str, max_requests: u64, window_seconds: u64)
        -> AppResult<(u64, bool)>;
}

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    /// Connect to Redis.
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }

    /// Round-trip a PING, used by the health endpoint.
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    // =========================================================================
    // Generic Cache Operations
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    // =========================================================================
    // Rate Limiting Operations
    // =========================================================================

    /// Count a request in the current fixed window.
    /// Returns (current_count, is_allowed).
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        // INCR creates the key at 1; the first hit in a window sets its expiry
        let count: i64 = conn.incr(&key, 1).await.map_err(cache_error)?;
        if count == 1 {
            let _: () = conn
                .expire(&key, window_seconds as i64)
                .await
                .map_err(cache_error)?;
        }

        let count = count.max(0) as u64;
        Ok((count, count <= max_requests))
    }
}

#[async_trait]
impl RateLimiter for Cache {
    async fn hit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        self.check_rate_limit(identifier, max_requests, window_seconds)
            .await
    }
}

#[async_trait]
impl ProductCache for Cache {
    async fn get_product(&self, product_id: Uuid) -> AppResult<Option<Product>> {
        self.get(&product_key(&product_id)).await
    }

    async fn put_product(&self, product: &Product) -> AppResult<()> {
        self.set_with_ttl(&product_key(&product.id), product, PRODUCT_CACHE_TTL_SECONDS)
            .await
    }

    /// Drop several entries in one round trip.
    async fn invalidate_products(&self, product_ids: &[Uuid]) -> AppResult<()> {
        if product_ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = product_ids.iter().map(product_key).collect();
        let mut conn = self.connection.clone();
        let _: () = conn.del(keys).await.map_err(cache_error)?;
        Ok(())
    }
}

fn product_key(product_id: &Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_PRODUCT, product_id)
}

/// Convert Redis error to AppError.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::internal(format!("Cache error: {}", e))
}
