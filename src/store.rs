//! Store façade over one configured provider with a local fallback
//!
//! [`CredentialStore`] owns exactly one configured [`StorageProvider`] plus an
//! always-available [`LocalFileProvider`]. When the configured provider fails
//! an operation, the store logs a warning and transparently retries against
//! the local fallback, so an unavailable object store degrades durability
//! scope instead of breaking token issuance. Only an explicit
//! [`health_check`](CredentialStore::health_check) reports the configured
//! provider's state.

use crate::config::{CredentialConfig, StorageSelection};
use crate::core::{ConfigError, StorageError, TokenOwner, TokenRecord};
use crate::providers::{
    DeleteScope, LocalFileProvider, LocalProviderConfig, StorageMetrics, StorageProvider,
};
use std::sync::Arc;

/// Token persistence façade with fallback behaviour.
#[derive(Clone)]
pub struct CredentialStore {
    primary: Arc<dyn StorageProvider>,
    fallback: Arc<LocalFileProvider>,
    metrics: Arc<StorageMetrics>,
}

impl CredentialStore {
    /// Build the store from validated configuration, constructing the
    /// selected provider exactly once.
    pub async fn from_config(config: &CredentialConfig) -> Result<Self, ConfigError> {
        let fallback =
            LocalFileProvider::new(LocalProviderConfig::new(config.fallback_base_path()?))?;

        let primary: Arc<dyn StorageProvider> = match &config.storage {
            StorageSelection::Local(local) => Arc::new(LocalFileProvider::new(local.clone())?),
            #[cfg(feature = "object-store-s3")]
            StorageSelection::S3(s3) => {
                Arc::new(crate::providers::S3ObjectProvider::new(s3.clone()).await?)
            }
            #[cfg(feature = "object-store-azblob")]
            StorageSelection::Azblob(azblob) => {
                Arc::new(crate::providers::AzblobObjectProvider::new(azblob.clone())?)
            }
        };

        Ok(Self::new(primary, fallback))
    }

    /// Build the store from explicit provider instances.
    pub fn new(primary: Arc<dyn StorageProvider>, fallback: LocalFileProvider) -> Self {
        Self {
            primary,
            fallback: Arc::new(fallback),
            metrics: Arc::new(StorageMetrics::new()),
        }
    }

    /// Configured provider tag for logs.
    pub fn provider_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Store-level counters (fallback activations in particular).
    pub fn metrics(&self) -> &StorageMetrics {
        &self.metrics
    }

    /// Persist a record for the owner. Falls back to the local provider when
    /// the configured one fails; errors only when both do.
    pub async fn store_token(
        &self,
        owner: &TokenOwner,
        record: &TokenRecord,
    ) -> Result<String, StorageError> {
        match self.primary.store(owner, record).await {
            Ok(location) => Ok(location),
            Err(err) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    owner = %owner,
                    error = %err,
                    "configured provider failed to store token, retrying via local fallback"
                );
                self.metrics.record_fallback();
                self.fallback.store(owner, record).await
            }
        }
    }

    /// Load the latest record for the owner, consulting the fallback both
    /// when the configured provider fails and when it simply has no record
    /// (it may have been unavailable at store time).
    ///
    /// Infrastructure failures on both sides are logged and reported as "no
    /// record"; issuance paths then mint a fresh token instead of failing the
    /// request.
    pub async fn load_latest_token(&self, owner: &TokenOwner) -> Option<TokenRecord> {
        match self.primary.load_latest(owner).await {
            Ok(record) => Some(record),
            Err(StorageError::NotFound { .. }) => match self.fallback.load_latest(owner).await {
                Ok(record) => Some(record),
                Err(StorageError::NotFound { .. }) => None,
                Err(err) => {
                    tracing::warn!(owner = %owner, error = %err, "local fallback load failed");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    owner = %owner,
                    error = %err,
                    "configured provider failed to load token, retrying via local fallback"
                );
                self.metrics.record_fallback();
                match self.fallback.load_latest(owner).await {
                    Ok(record) => Some(record),
                    Err(StorageError::NotFound { .. }) => None,
                    Err(fallback_err) => {
                        tracing::error!(
                            owner = %owner,
                            error = %fallback_err,
                            "local fallback load failed after provider failure"
                        );
                        None
                    }
                }
            }
        }
    }

    /// List stored record locations for the owner.
    pub async fn list_tokens(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError> {
        match self.primary.list(owner).await {
            Ok(locations) => Ok(locations),
            Err(err) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    owner = %owner,
                    error = %err,
                    "configured provider failed to list tokens, retrying via local fallback"
                );
                self.metrics.record_fallback();
                self.fallback.list(owner).await
            }
        }
    }

    /// Delete records for the owner.
    pub async fn delete_tokens(
        &self,
        owner: &TokenOwner,
        scope: DeleteScope<'_>,
    ) -> Result<bool, StorageError> {
        match self.primary.delete(owner, scope).await {
            Ok(removed) => Ok(removed),
            Err(err) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    owner = %owner,
                    error = %err,
                    "configured provider failed to delete tokens, retrying via local fallback"
                );
                self.metrics.record_fallback();
                self.fallback.delete(owner, scope).await
            }
        }
    }

    /// Probe the configured provider. The fallback's availability is assumed.
    pub async fn health_check(&self) -> bool {
        self.primary.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockStorageProvider;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store_with_mock() -> (CredentialStore, Arc<MockStorageProvider>, TempDir) {
        let dir = TempDir::new().unwrap();
        let fallback = LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap();
        let mock = Arc::new(MockStorageProvider::new());
        let store = CredentialStore::new(mock.clone(), fallback);
        (store, mock, dir)
    }

    #[tokio::test]
    async fn test_store_uses_primary_when_healthy() {
        let (store, _mock, _dir) = store_with_mock();
        let record = TokenRecord::issue(Duration::from_secs(60));

        let location = store.store_token(&TokenOwner::System, &record).await.unwrap();
        assert!(location.starts_with("mock://"));
        assert_eq!(store.metrics().fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_store_falls_back_on_primary_failure() {
        let (store, mock, dir) = store_with_mock();
        mock.fail_stores(true);
        let record = TokenRecord::issue(Duration::from_secs(60));

        let location = store.store_token(&TokenOwner::System, &record).await.unwrap();
        assert!(location.starts_with(dir.path().to_str().unwrap()));
        assert_eq!(store.metrics().fallback_count(), 1);

        // Durable after the failed primary store: load finds the fallback copy
        let loaded = store.load_latest_token(&TokenOwner::System).await.unwrap();
        assert_eq!(loaded.value.expose(), record.value.expose());
    }

    #[tokio::test]
    async fn test_load_checks_fallback_when_primary_empty() {
        let (store, mock, _dir) = store_with_mock();
        let record = TokenRecord::issue(Duration::from_secs(60));

        // Simulate a record written during an earlier outage
        mock.fail_stores(true);
        store.store_token(&TokenOwner::System, &record).await.unwrap();
        mock.fail_stores(false);

        let loaded = store.load_latest_token(&TokenOwner::System).await;
        assert!(loaded.is_some());
    }

    #[tokio::test]
    async fn test_load_none_when_nothing_stored() {
        let (store, _mock, _dir) = store_with_mock();
        assert!(store.load_latest_token(&TokenOwner::System).await.is_none());
    }

    #[tokio::test]
    async fn test_health_check_reflects_primary() {
        let (store, mock, _dir) = store_with_mock();
        assert!(store.health_check().await);
        mock.set_healthy(false);
        assert!(!store.health_check().await);
    }
}
