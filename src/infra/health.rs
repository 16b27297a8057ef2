//! Dependency probes reported by the `/health` endpoint.

use async_trait::async_trait;

use super::{Cache, Database};
use crate::errors::{AppError, AppResult};

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Key under which the result is reported
    fn component(&self) -> &'static str;

    async fn check(&self) -> AppResult<()>;
}

#[async_trait]
impl HealthCheck for Database {
    fn component(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> AppResult<()> {
        self.ping().await.map_err(AppError::from)
    }
}

#[async_trait]
impl HealthCheck for Cache {
    fn component(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> AppResult<()> {
        self.ping().await
    }
}
