//! In-memory storage provider for tests
//!
//! Holds records in a map and can be told to fail specific operations, which
//! is how the store façade's fallback path gets exercised without a real
//! broken backend.

use crate::core::{StorageError, TokenOwner, TokenRecord};
use crate::providers::{DeleteScope, StorageProvider, record_file_name};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory [`StorageProvider`] with failure injection.
#[derive(Default)]
pub struct MockStorageProvider {
    // owner key -> (location, serialized record), insertion order
    records: RwLock<HashMap<String, Vec<(String, String)>>>,
    fail_stores: AtomicBool,
    fail_loads: AtomicBool,
    unhealthy: AtomicBool,
    store_calls: AtomicU64,
}

impl MockStorageProvider {
    /// Create an empty mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `store` calls fail with a backend error.
    pub fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `load_latest`/`list` calls fail with a backend error.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Force `health_check` to report the given state.
    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// Number of `store` calls observed, including failed ones.
    pub fn store_calls(&self) -> u64 {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Number of records currently held for the owner.
    pub async fn record_count(&self, owner: &TokenOwner) -> usize {
        self.records
            .read()
            .await
            .get(owner.as_str())
            .map_or(0, Vec::len)
    }

    fn backend_error(&self, owner: &TokenOwner, message: &str) -> StorageError {
        StorageError::Backend {
            owner: owner.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl StorageProvider for MockStorageProvider {
    async fn store(
        &self,
        owner: &TokenOwner,
        record: &TokenRecord,
    ) -> Result<String, StorageError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(self.backend_error(owner, "injected store failure"));
        }

        let location = format!(
            "mock://{}/{}",
            owner.safe_component(),
            record_file_name(owner, record.created_at)
        );
        self.records
            .write()
            .await
            .entry(owner.as_str().to_string())
            .or_default()
            .push((location.clone(), record.to_text()));
        Ok(location)
    }

    async fn load_latest(&self, owner: &TokenOwner) -> Result<TokenRecord, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(self.backend_error(owner, "injected load failure"));
        }

        let records = self.records.read().await;
        let Some((_, body)) = records.get(owner.as_str()).and_then(|v| v.last()) else {
            return Err(StorageError::NotFound {
                owner: owner.to_string(),
            });
        };
        TokenRecord::parse(body).map_err(|e| StorageError::ReadFailure {
            owner: owner.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }

    async fn list(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(self.backend_error(owner, "injected list failure"));
        }
        Ok(self
            .records
            .read()
            .await
            .get(owner.as_str())
            .map(|v| v.iter().map(|(loc, _)| loc.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete(
        &self,
        owner: &TokenOwner,
        scope: DeleteScope<'_>,
    ) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let Some(entries) = records.get_mut(owner.as_str()) else {
            return Ok(false);
        };
        let before = entries.len();
        match scope {
            DeleteScope::All => entries.clear(),
            DeleteScope::Location(location) => entries.retain(|(loc, _)| loc != location),
        }
        Ok(entries.len() < before)
    }

    async fn health_check(&self) -> bool {
        !self.unhealthy.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_store_load_round_trip() {
        let provider = MockStorageProvider::new();
        let owner = TokenOwner::System;
        let record = TokenRecord::issue(Duration::from_secs(60));

        provider.store(&owner, &record).await.unwrap();
        let loaded = provider.load_latest(&owner).await.unwrap();
        assert_eq!(loaded.value.expose(), record.value.expose());
    }

    #[tokio::test]
    async fn test_injected_store_failure() {
        let provider = MockStorageProvider::new();
        provider.fail_stores(true);

        let result = provider
            .store(&TokenOwner::System, &TokenRecord::issue(Duration::from_secs(60)))
            .await;
        assert!(matches!(result, Err(StorageError::Backend { .. })));
        assert_eq!(provider.store_calls(), 1);
    }

    #[tokio::test]
    async fn test_health_toggle() {
        let provider = MockStorageProvider::new();
        assert!(provider.health_check().await);
        provider.set_healthy(false);
        assert!(!provider.health_check().await);
    }
}
