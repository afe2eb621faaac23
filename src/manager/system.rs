//! Shared system-token manager (legacy regime)
//!
//! Exactly one token exists for the whole deployment. It lives in an
//! in-memory cache guarded by a mutex and in the credential store; it has no
//! identity-store row. The token is created lazily on first access, adopted
//! from storage when a persisted copy is still valid (surviving restarts),
//! and replaced wholesale on rotation.
//!
//! Rotation is single-flight: the cache mutex is held across the
//! generate-persist-adopt sequence, so concurrent callers that arrive during
//! a rotation wait on the lock and then observe the record that rotation
//! produced, with exactly one record persisted.

use crate::core::{AuthTokenError, TokenOwner, TokenRecord, TokenValue};
use crate::hooks::SyncHook;
use crate::store::CredentialStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Manager for the single shared system token.
pub struct SystemTokenManager {
    store: CredentialStore,
    rotation_interval: Duration,
    sync_hook: Option<Arc<dyn SyncHook>>,
    current: Mutex<Option<TokenRecord>>,
}

impl SystemTokenManager {
    /// Create a manager persisting through `store`, issuing tokens valid for
    /// `rotation_interval`.
    pub fn new(store: CredentialStore, rotation_interval: Duration) -> Self {
        Self {
            store,
            rotation_interval,
            sync_hook: None,
            current: Mutex::new(None),
        }
    }

    /// Attach the external-sync hook invoked after each successful rotation.
    pub fn with_sync_hook(mut self, hook: Arc<dyn SyncHook>) -> Self {
        self.sync_hook = Some(hook);
        self
    }

    /// Current token value, issuing a fresh one if none exists or the cached
    /// and persisted copies are expired.
    ///
    /// Safe under arbitrary concurrency; at most one rotation runs at a time
    /// and contemporaneous callers all receive that rotation's token.
    pub async fn get_current(&self) -> Result<TokenValue, AuthTokenError> {
        let mut guard = self.current.lock().await;

        if let Some(record) = guard.as_ref() {
            if !record.is_expired() {
                return Ok(record.value.clone());
            }
        }

        // Cache empty or stale: prefer a still-valid persisted record so the
        // active token survives process restarts.
        if let Some(record) = self.store.load_latest_token(&TokenOwner::System).await {
            if !record.is_expired() {
                tracing::debug!("adopted persisted system token");
                let value = record.value.clone();
                *guard = Some(record);
                return Ok(value);
            }
        }

        let (value, location) = self.rotate_locked(&mut guard).await?;
        drop(guard);
        self.fire_sync_hook(&value, &location).await;
        Ok(value)
    }

    /// Force a rotation regardless of the current token's validity.
    pub async fn rotate(&self) -> Result<TokenValue, AuthTokenError> {
        let mut guard = self.current.lock().await;
        let (value, location) = self.rotate_locked(&mut guard).await?;
        drop(guard);
        self.fire_sync_hook(&value, &location).await;
        Ok(value)
    }

    /// Constant-time check of `candidate` against the current token.
    ///
    /// Empty input is rejected immediately. A stale cache is refreshed (and
    /// rotated if needed) before comparing, so a candidate equal to an
    /// expired token never validates.
    pub async fn validate(&self, candidate: &str) -> Result<bool, AuthTokenError> {
        if candidate.is_empty() {
            return Ok(false);
        }
        let current = self.get_current().await?;
        Ok(current.matches(candidate))
    }

    // Caller holds the cache lock.
    async fn rotate_locked(
        &self,
        guard: &mut Option<TokenRecord>,
    ) -> Result<(TokenValue, String), AuthTokenError> {
        let record = TokenRecord::issue(self.rotation_interval);
        let location = self
            .store
            .store_token(&TokenOwner::System, &record)
            .await
            .map_err(|source| AuthTokenError::Persistence { source })?;

        let value = record.value.clone();
        *guard = Some(record);

        tracing::info!(
            provider = self.store.provider_name(),
            location = %location,
            "rotated system token"
        );
        Ok((value, location))
    }

    async fn fire_sync_hook(&self, value: &TokenValue, location: &str) {
        if let Some(hook) = &self.sync_hook {
            if let Err(err) = hook.sync(value.expose(), location).await {
                tracing::warn!(error = %err, "external sync hook failed after rotation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LocalFileProvider, LocalProviderConfig, MockStorageProvider};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    fn manager(interval: Duration) -> (SystemTokenManager, Arc<MockStorageProvider>, TempDir) {
        let dir = TempDir::new().unwrap();
        let fallback = LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap();
        let mock = Arc::new(MockStorageProvider::new());
        let store = CredentialStore::new(mock.clone(), fallback);
        (SystemTokenManager::new(store, interval), mock, dir)
    }

    #[tokio::test]
    async fn test_lazy_issuance_and_stability() {
        let (manager, mock, _dir) = manager(Duration::from_secs(3600));

        let first = manager.get_current().await.unwrap();
        let second = manager.get_current().await.unwrap();
        assert_eq!(first.expose(), second.expose());
        assert_eq!(mock.store_calls(), 1);
    }

    #[tokio::test]
    async fn test_rotation_invalidates_previous() {
        let (manager, _mock, _dir) = manager(Duration::from_secs(3600));

        let old = manager.get_current().await.unwrap().expose().to_string();
        assert!(manager.validate(&old).await.unwrap());

        let new = manager.rotate().await.unwrap();
        assert!(!manager.validate(&old).await.unwrap());
        assert!(manager.validate(new.expose()).await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_rejects_empty() {
        let (manager, _mock, _dir) = manager(Duration::from_secs(3600));
        assert!(!manager.validate("").await.unwrap());
    }

    #[tokio::test]
    async fn test_adopts_persisted_token_across_instances() {
        let dir = TempDir::new().unwrap();
        let make = || {
            let fallback = LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap();
            let primary =
                Arc::new(LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap());
            SystemTokenManager::new(
                CredentialStore::new(primary, fallback),
                Duration::from_secs(3600),
            )
        };

        let first = make().get_current().await.unwrap();
        // A second manager over the same storage adopts the persisted record
        let second = make().get_current().await.unwrap();
        assert_eq!(first.expose(), second.expose());
    }

    #[tokio::test]
    async fn test_concurrent_get_current_single_rotation() {
        let (manager, mock, _dir) = manager(Duration::from_secs(3600));
        let manager = Arc::new(manager);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_current().await.unwrap() })
            })
            .collect();

        let mut values = Vec::new();
        for task in tasks {
            values.push(task.await.unwrap());
        }

        let first = values[0].expose();
        assert!(values.iter().all(|v| v.expose() == first));
        assert_eq!(mock.store_calls(), 1);
        assert_eq!(mock.record_count(&TokenOwner::System).await, 1);
    }

    #[tokio::test]
    async fn test_rotation_survives_primary_outage() {
        let (manager, mock, _dir) = manager(Duration::from_secs(3600));
        mock.fail_stores(true);

        // Rotation falls back to the local provider and still succeeds
        let token = manager.rotate().await.unwrap();
        assert!(manager.validate(token.expose()).await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_hook_failure_does_not_fail_rotation() {
        struct FailingHook(AtomicU64);

        #[async_trait::async_trait]
        impl SyncHook for FailingHook {
            async fn sync(&self, _token: &str, _location: &str) -> Result<(), crate::hooks::HookError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err("sync endpoint unreachable".into())
            }
        }

        let (manager, _mock, _dir) = manager(Duration::from_secs(3600));
        let hook = Arc::new(FailingHook(AtomicU64::new(0)));
        let manager = manager.with_sync_hook(hook.clone());

        assert!(manager.rotate().await.is_ok());
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }
}
