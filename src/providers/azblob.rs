//! Blob-container object storage provider
//!
//! Azure-compatible blob storage through an opendal `Azblob` operator. Key
//! layout and record body match the S3 provider
//! (`<prefix>/<safe-owner>/token_<safe-owner>_<YYYYMMDD_HHMMSS>.txt`), with
//! owner/expiry attached as user metadata on each blob.

use crate::core::{ConfigError, StorageError, TokenOwner, TokenRecord};
use crate::providers::{DeleteScope, StorageMetrics, StorageProvider};
use crate::providers::{is_record_file_name, record_file_name};
use async_trait::async_trait;
use opendal::services::Azblob;
use opendal::{ErrorKind, Operator};
use serde::{Deserialize, Serialize};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

/// Blob-container provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AzblobProviderConfig {
    /// Target container
    pub container: String,

    /// Storage account name
    pub account_name: Option<String>,

    /// Storage account shared key
    pub account_key: Option<String>,

    /// Custom endpoint (Azurite or sovereign clouds)
    pub endpoint: Option<String>,

    /// Blob name prefix under which all token objects live
    #[serde(default)]
    pub prefix: String,

    /// Per-operation timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

impl AzblobProviderConfig {
    /// Configuration for `container` with defaults elsewhere.
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            account_name: None,
            account_key: None,
            endpoint: None,
            prefix: String::new(),
            timeout: default_timeout(),
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "container".to_string(),
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

/// Blob-container object storage provider.
#[derive(Clone)]
pub struct AzblobObjectProvider {
    operator: Operator,
    config: AzblobProviderConfig,
    metrics: Arc<StorageMetrics>,
}

impl std::fmt::Debug for AzblobObjectProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzblobObjectProvider")
            .field("container", &self.config.container)
            .field("prefix", &self.config.prefix)
            .finish()
    }
}

impl AzblobObjectProvider {
    /// Create a provider from validated configuration.
    pub fn new(config: AzblobProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = Azblob::default().container(&config.container);
        if let Some(account_name) = &config.account_name {
            builder = builder.account_name(account_name);
        }
        if let Some(account_key) = &config.account_key {
            builder = builder.account_key(account_key);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint(endpoint);
        }

        let operator = Operator::new(builder)
            .map_err(|e| ConfigError::InvalidValue {
                field: "container".to_string(),
                reason: format!("failed to create blob operator: {e}"),
            })?
            .finish();

        tracing::info!(
            container = %config.container,
            prefix = %config.prefix,
            "initialized blob-container provider"
        );

        Ok(Self {
            operator,
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

    async fn with_timeout<T, F>(
        &self,
        owner: &TokenOwner,
        fut: F,
    ) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, opendal::Error>>,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                owner: owner.to_string(),
            }),
            Ok(Err(e)) => Err(StorageError::Backend {
                owner: owner.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(StorageError::Timeout {
                duration: self.config.timeout,
            }),
        }
    }

    /// Token blob paths for the owner, oldest first.
    async fn record_paths(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError> {
        let prefix = self.owner_prefix(owner);
        let entries = match self.with_timeout(owner, self.operator.list(&prefix)).await {
            Ok(entries) => entries,
            Err(StorageError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut paths: Vec<String> = entries
            .iter()
            .filter(|entry| is_record_file_name(entry.name()))
            .map(|entry| entry.path().to_string())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl StorageProvider for AzblobObjectProvider {
    #[tracing::instrument(skip(self, record), fields(provider = "azblob", owner = %owner))]
    async fn store(
        &self,
        owner: &TokenOwner,
        record: &TokenRecord,
    ) -> Result<String, StorageError> {
        let start = std::time::Instant::now();
        let path = format!(
            "{}{}",
            self.owner_prefix(owner),
            record_file_name(owner, record.created_at)
        );

        let metadata = vec![
            ("owner".to_string(), owner.as_str().to_string()),
            ("expires_at".to_string(), record.expires_at.to_rfc3339()),
        ];
        let result = self
            .with_timeout(
                owner,
                self.operator
                    .write_with(&path, record.to_text().into_bytes())
                    .content_type("text/plain")
                    .user_metadata(metadata)
                    .into_future(),
            )
            .await;

        self.metrics
            .record_operation("store", start.elapsed(), result.is_ok());
        result?;

        tracing::debug!(path = %path, "stored token blob");
        Ok(path)
    }

    #[tracing::instrument(skip(self), fields(provider = "azblob", owner = %owner))]
    async fn load_latest(&self, owner: &TokenOwner) -> Result<TokenRecord, StorageError> {
        let start = std::time::Instant::now();

        let result = async {
            let paths = self.record_paths(owner).await?;
            let Some(latest) = paths.last() else {
                return Err(StorageError::NotFound {
                    owner: owner.to_string(),
                });
            };

            let buffer = self
                .with_timeout(owner, self.operator.read(latest))
                .await?;
            let bytes = buffer.to_vec();
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
        let result = self.record_paths(owner).await;
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
            let existing = self.record_paths(owner).await?;
            let targets: Vec<String> = match scope {
                DeleteScope::All => existing,
                DeleteScope::Location(location) => existing
                    .into_iter()
                    .filter(|path| path == location)
                    .collect(),
            };

            if targets.is_empty() {
                return Ok(false);
            }

            for path in &targets {
                self.with_timeout(owner, self.operator.delete(path)).await?;
            }
            Ok(true)
        }
        .await;

        self.metrics
            .record_operation("delete", start.elapsed(), result.is_ok());
        result
    }

    async fn health_check(&self) -> bool {
        tokio::time::timeout(self.config.timeout, self.operator.check())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "azblob"
    }
}
