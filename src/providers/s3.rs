//! S3-compatible object storage provider
//!
//! Stores one object per issued token under
//! `<prefix>/<safe-owner>/token_<safe-owner>_<YYYYMMDD_HHMMSS>.txt`, with the
//! serialized record as the object body and owner/expiry attached as object
//! metadata. Works against AWS S3 or any compatible endpoint (MinIO,
//! LocalStack) via `endpoint_url`.

use crate::core::{ConfigError, StorageError, TokenOwner, TokenRecord};
use crate::providers::{DeleteScope, StorageMetrics, StorageProvider};
use crate::providers::{is_record_file_name, record_file_name};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// S3-compatible provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct S3ProviderConfig {
    /// Target bucket
    pub bucket: String,

    /// AWS region; auto-detected from the environment when unset
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,

    /// Key prefix under which all token objects live
    #[serde(default)]
    pub prefix: String,

    /// Per-operation timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

impl S3ProviderConfig {
    /// Configuration for `bucket` with defaults elsewhere.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint_url: None,
            prefix: String::new(),
            timeout: default_timeout(),
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bucket".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let timeout_secs = self.timeout.as_secs();
        if !(1..=60).contains(&timeout_secs) {
            return Err(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                reason: format!("must be between 1 and 60 seconds, got {timeout_secs}"),
            });
        }
        Ok(())
    }
}

/// S3-compatible object storage provider.
#[derive(Clone)]
pub struct S3ObjectProvider {
    client: S3Client,
    config: S3ProviderConfig,
    metrics: Arc<StorageMetrics>,
}

impl std::fmt::Debug for S3ObjectProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectProvider")
            .field("bucket", &self.config.bucket)
            .field("prefix", &self.config.prefix)
            .finish()
    }
}

impl S3ObjectProvider {
    /// Create a provider, initializing the SDK client from the default
    /// credential chain plus any overrides in the configuration.
    pub async fn new(config: S3ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let client = S3Client::new(&sdk_config);

        tracing::info!(
            bucket = %config.bucket,
            region = ?config.region,
            prefix = %config.prefix,
            "initialized S3 object provider"
        );

        Ok(Self {
            client,
            config,
            metrics: Arc::new(StorageMetrics::new()),
        })
    }

    /// Operation counters for this provider.
    pub fn metrics(&self) -> &StorageMetrics {
        &self.metrics
    }

    fn owner_prefix(&self, owner: &TokenOwner) -> String {
        if self.config.prefix.is_empty() {
            format!("{}/", owner.safe_component())
        } else {
            format!(
                "{}/{}/",
                self.config.prefix.trim_end_matches('/'),
                owner.safe_component()
            )
        }
    }

    fn object_key(&self, owner: &TokenOwner, record: &TokenRecord) -> String {
        format!(
            "{}{}",
            self.owner_prefix(owner),
            record_file_name(owner, record.created_at)
        )
    }

    async fn with_timeout<T, E, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result.map_err(|e| StorageError::Backend {
                owner: String::new(),
                message: e.to_string(),
            }),
            Err(_) => Err(StorageError::Timeout {
                duration: self.config.timeout,
            }),
        }
    }

    fn tag_owner(err: StorageError, owner: &TokenOwner) -> StorageError {
        match err {
            StorageError::Backend { message, .. } => StorageError::Backend {
                owner: owner.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Token object keys for the owner, oldest first.
    async fn record_keys(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError> {
        let response = self
            .with_timeout(
                self.client
                    .list_objects_v2()
                    .bucket(&self.config.bucket)
                    .prefix(self.owner_prefix(owner))
                    .send(),
            )
            .await
            .map_err(|e| Self::tag_owner(e, owner))?;

        let mut keys: Vec<String> = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .filter(|key| {
                key.rsplit('/')
                    .next()
                    .is_some_and(is_record_file_name)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl StorageProvider for S3ObjectProvider {
    #[tracing::instrument(skip(self, record), fields(provider = "s3", owner = %owner))]
    async fn store(
        &self,
        owner: &TokenOwner,
        record: &TokenRecord,
    ) -> Result<String, StorageError> {
        let start = std::time::Instant::now();
        let key = self.object_key(owner, record);

        let result = self
            .with_timeout(
                self.client
                    .put_object()
                    .bucket(&self.config.bucket)
                    .key(&key)
                    .body(ByteStream::from(record.to_text().into_bytes()))
                    .content_type("text/plain")
                    .metadata("owner", owner.as_str())
                    .metadata("expires-at", record.expires_at.to_rfc3339())
                    .send(),
            )
            .await
            .map_err(|e| Self::tag_owner(e, owner));

        self.metrics
            .record_operation("store", start.elapsed(), result.is_ok());
        result?;

        tracing::debug!(key = %key, "stored token object");
        Ok(key)
    }

    #[tracing::instrument(skip(self), fields(provider = "s3", owner = %owner))]
    async fn load_latest(&self, owner: &TokenOwner) -> Result<TokenRecord, StorageError> {
        let start = std::time::Instant::now();

        let result = async {
            let keys = self.record_keys(owner).await?;
            let Some(latest) = keys.last() else {
                return Err(StorageError::NotFound {
                    owner: owner.to_string(),
                });
            };

            let response = self
                .with_timeout(
                    self.client
                        .get_object()
                        .bucket(&self.config.bucket)
                        .key(latest)
                        .send(),
                )
                .await
                .map_err(|e| Self::tag_owner(e, owner))?;

            let bytes = response
                .body
                .collect()
                .await
                .map_err(|e| StorageError::ReadFailure {
                    owner: owner.to_string(),
                    source: std::io::Error::other(e.to_string()),
                })?
                .into_bytes();

            let text = String::from_utf8_lossy(&bytes);
            TokenRecord::parse(&text).map_err(|e| StorageError::ReadFailure {
                owner: owner.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })
        }
        .await;

        self.metrics
            .record_operation("load", start.elapsed(), result.is_ok());
        result
    }

    async fn list(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError> {
        let start = std::time::Instant::now();
        let result = self.record_keys(owner).await;
        self.metrics
            .record_operation("list", start.elapsed(), result.is_ok());
        result
    }

    async fn delete(
        &self,
        owner: &TokenOwner,
        scope: DeleteScope<'_>,
    ) -> Result<bool, StorageError> {
        let start = std::time::Instant::now();

        let result = async {
            let existing = self.record_keys(owner).await?;
            let targets: Vec<String> = match scope {
                DeleteScope::All => existing,
                DeleteScope::Location(location) => existing
                    .into_iter()
                    .filter(|key| key == location)
                    .collect(),
            };

            if targets.is_empty() {
                return Ok(false);
            }

            for key in &targets {
                self.with_timeout(
                    self.client
                        .delete_object()
                        .bucket(&self.config.bucket)
                        .key(key)
                        .send(),
                )
                .await
                .map_err(|e| Self::tag_owner(e, owner))?;
            }
            Ok(true)
        }
        .await;

        self.metrics
            .record_operation("delete", start.elapsed(), result.is_ok());
        result
    }

    async fn health_check(&self) -> bool {
        self.with_timeout(
            self.client
                .head_bucket()
                .bucket(&self.config.bucket)
                .send(),
        )
        .await
        .is_ok()
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_empty_bucket() {
        assert!(S3ProviderConfig::new("").validate().is_err());
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let mut config = S3ProviderConfig::new("tokens");
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = S3ProviderConfig::new("tokens");
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.prefix.is_empty());
    }
}
