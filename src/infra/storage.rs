//! Object storage for product images.
//!
//! `S3Storage` talks to AWS S3 or, when an endpoint is configured, to any
//! S3-compatible store using path-style addressing.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult};

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<()>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Public URL clients use to fetch `key`.
    fn public_url(&self, key: &str) -> String;
}

pub struct S3Storage {
    client: Client,
    config: StorageConfig,
}

impl S3Storage {
    pub async fn connect(config: StorageConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(bucket = %config.bucket, region = %config.region, "Object storage configured");

        Self {
            client: Client::from_conf(builder.build()),
            config,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<()> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| storage_error("put", key, DisplayErrorContext(&e)))?;

        tracing::debug!(key = %key, "Object stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("delete", key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_url_for(&self.config, key)
    }
}

/// Build the public link for `key`: configured CDN base first, then the
/// custom endpoint (path-style), then the AWS virtual-hosted URL.
pub fn public_url_for(config: &StorageConfig, key: &str) -> String {
    if let Some(base) = &config.public_url {
        return format!("{}/{}", base.trim_end_matches('/'), key);
    }
    if let Some(endpoint) = &config.endpoint {
        return format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            config.bucket,
            key
        );
    }
    format!(
        "https://{}.s3.{}.amazonaws.com/{}",
        config.bucket, config.region, key
    )
}

fn storage_error(op: &str, key: &str, e: impl std::fmt::Display) -> AppError {
    tracing::error!(op = %op, key = %key, error = %e, "Object storage request failed");
    AppError::storage(format!("Object storage {} failed", op))
}
