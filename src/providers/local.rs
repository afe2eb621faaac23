//! Local filesystem storage provider
//!
//! The always-available backend and the fallback target for every other
//! provider. Records live under one subdirectory per owner
//! (`<base>/<safe-owner>/token_<safe-owner>_<YYYYMMDD_HHMMSS>.txt`), written
//! via a temp file in the destination directory followed by an atomic rename,
//! with owner-only permissions.

use crate::core::{StorageError, TokenOwner, TokenRecord};
use crate::providers::{DeleteScope, StorageMetrics, StorageProvider};
use crate::providers::{is_record_file_name, record_file_name};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Local filesystem provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalProviderConfig {
    /// Base directory for token records. Must be absolute.
    pub base_path: PathBuf,

    /// Create the directory tree on demand. Default: true.
    #[serde(default = "default_create_dir")]
    pub create_dir: bool,
}

fn default_create_dir() -> bool {
    true
}

impl LocalProviderConfig {
    /// Configuration rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            create_dir: default_create_dir(),
        }
    }

    /// Set whether missing directories are created on demand.
    pub fn with_create_dir(mut self, create_dir: bool) -> Self {
        self.create_dir = create_dir;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), crate::core::ConfigError> {
        if !self.base_path.is_absolute() {
            return Err(crate::core::ConfigError::InvalidValue {
                field: "base_path".to_string(),
                reason: "must be an absolute path".to_string(),
            });
        }
        Ok(())
    }
}

/// Local filesystem storage provider.
#[derive(Clone)]
pub struct LocalFileProvider {
    config: LocalProviderConfig,
    metrics: Arc<StorageMetrics>,
}

impl LocalFileProvider {
    /// Create a provider from validated configuration.
    pub fn new(config: LocalProviderConfig) -> Result<Self, crate::core::ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: Arc::new(StorageMetrics::new()),
        })
    }

    /// Operation counters for this provider.
    pub fn metrics(&self) -> &StorageMetrics {
        &self.metrics
    }

    fn owner_dir(&self, owner: &TokenOwner) -> PathBuf {
        self.config.base_path.join(owner.safe_component())
    }

    async fn ensure_owner_dir(&self, owner: &TokenOwner) -> Result<PathBuf, StorageError> {
        let dir = self.owner_dir(owner);
        if !dir.exists() {
            if !self.config.create_dir {
                return Err(StorageError::WriteFailure {
                    owner: owner.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("directory missing and create_dir is false: {}", dir.display()),
                    ),
                });
            }
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::WriteFailure {
                    owner: owner.to_string(),
                    source: e,
                })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                tokio::fs::set_permissions(&dir, perms).await.map_err(|e| {
                    StorageError::WriteFailure {
                        owner: owner.to_string(),
                        source: e,
                    }
                })?;
            }
        }
        Ok(dir)
    }

    /// Record file names for the owner, oldest first.
    async fn record_names(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError> {
        let dir = self.owner_dir(owner);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries =
            tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::ReadFailure {
                    owner: owner.to_string(),
                    source: e,
                })?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ReadFailure {
                owner: owner.to_string(),
                source: e,
            })?
        {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str() {
                if is_record_file_name(name) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Atomically write `data` to `path` with owner-only permissions.
///
/// The temp file lives in the destination directory so the final rename stays
/// on one filesystem and atomically replaces any existing file.
async fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_file_name(format!(
        "{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("token"),
        Uuid::new_v4()
    ));

    tokio::fs::write(&temp_path, data).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&temp_path, perms).await?;
    }

    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

#[async_trait]
impl StorageProvider for LocalFileProvider {
    #[tracing::instrument(skip(self, record), fields(provider = "local", owner = %owner))]
    async fn store(
        &self,
        owner: &TokenOwner,
        record: &TokenRecord,
    ) -> Result<String, StorageError> {
        let start = std::time::Instant::now();

        let dir = self.ensure_owner_dir(owner).await?;
        let path = dir.join(record_file_name(owner, record.created_at));

        let result = atomic_write(&path, record.to_text().as_bytes()).await;
        self.metrics
            .record_operation("store", start.elapsed(), result.is_ok());

        result.map_err(|e| StorageError::WriteFailure {
            owner: owner.to_string(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), "stored token record");
        Ok(path.display().to_string())
    }

    #[tracing::instrument(skip(self), fields(provider = "local", owner = %owner))]
    async fn load_latest(&self, owner: &TokenOwner) -> Result<TokenRecord, StorageError> {
        let start = std::time::Instant::now();

        let names = self.record_names(owner).await?;
        let Some(latest) = names.last() else {
            self.metrics
                .record_operation("load", start.elapsed(), false);
            return Err(StorageError::NotFound {
                owner: owner.to_string(),
            });
        };

        let path = self.owner_dir(owner).join(latest);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::ReadFailure {
                owner: owner.to_string(),
                source: e,
            })?;

        let record = TokenRecord::parse(&text).map_err(|e| StorageError::ReadFailure {
            owner: owner.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        });
        self.metrics
            .record_operation("load", start.elapsed(), record.is_ok());
        record
    }

    async fn list(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError> {
        let start = std::time::Instant::now();
        let dir = self.owner_dir(owner);
        let result = self.record_names(owner).await.map(|names| {
            names
                .into_iter()
                .map(|n| dir.join(n).display().to_string())
                .collect()
        });
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
        let dir = self.owner_dir(owner);
        let mut removed = false;

        let targets: Vec<PathBuf> = match scope {
            DeleteScope::All => self
                .record_names(owner)
                .await?
                .into_iter()
                .map(|n| dir.join(n))
                .collect(),
            DeleteScope::Location(location) => vec![PathBuf::from(location)],
        };

        for path in targets {
            if path.exists() {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| StorageError::WriteFailure {
                        owner: owner.to_string(),
                        source: e,
                    })?;
                removed = true;
            }
        }

        self.metrics
            .record_operation("delete", start.elapsed(), true);
        Ok(removed)
    }

    async fn health_check(&self) -> bool {
        if self.config.create_dir {
            tokio::fs::create_dir_all(&self.config.base_path)
                .await
                .is_ok()
        } else {
            self.config.base_path.is_dir()
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
