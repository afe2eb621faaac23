//! In-memory identity store for tests and single-process deployments

use crate::core::{IdentityStoreError, TokenValue};
use crate::identity::{IdentityRecord, IdentityStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of [`IdentityStore`].
///
/// Every mutation holds the map's write lock for its whole duration, which
/// gives the per-identity atomicity the trait requires for free.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    identities: RwLock<HashMap<String, IdentityRecord>>,
}

impl InMemoryIdentityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered identities.
    pub async fn len(&self) -> usize {
        self.identities.read().await.len()
    }

    /// Whether no identities are registered.
    pub async fn is_empty(&self) -> bool {
        self.identities.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert(&self, record: IdentityRecord) -> Result<bool, IdentityStoreError> {
        let mut identities = self.identities.write().await;
        if identities.contains_key(&record.email) {
            return Ok(false);
        }
        identities.insert(record.email.clone(), record);
        Ok(true)
    }

    async fn get(&self, email: &str) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        Ok(self.identities.read().await.get(email).cloned())
    }

    async fn set_token(
        &self,
        email: &str,
        token: &TokenValue,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, IdentityStoreError> {
        let mut identities = self.identities.write().await;
        let Some(record) = identities.get_mut(email) else {
            return Ok(false);
        };
        record.current_token = Some(token.clone());
        record.token_expires_at = Some(expires_at);
        Ok(true)
    }

    async fn clear_token(&self, email: &str) -> Result<bool, IdentityStoreError> {
        let mut identities = self.identities.write().await;
        let Some(record) = identities.get_mut(email) else {
            return Ok(false);
        };
        record.current_token = None;
        record.token_expires_at = None;
        Ok(true)
    }

    async fn clear_token_if(&self, email: &str, token: &str) -> Result<bool, IdentityStoreError> {
        let mut identities = self.identities.write().await;
        let Some(record) = identities.get_mut(email) else {
            return Ok(false);
        };
        let matches = record
            .current_token
            .as_ref()
            .is_some_and(|current| current.matches(token));
        if matches {
            record.current_token = None;
            record.token_expires_at = None;
        }
        Ok(matches)
    }

    async fn touch_last_login(
        &self,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<(), IdentityStoreError> {
        if let Some(record) = self.identities.write().await.get_mut(email) {
            record.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn set_active(&self, email: &str, active: bool) -> Result<bool, IdentityStoreError> {
        let mut identities = self.identities.write().await;
        let Some(record) = identities.get_mut(email) else {
            return Ok(false);
        };
        record.is_active = active;
        if !active {
            record.current_token = None;
            record.token_expires_at = None;
        }
        Ok(true)
    }

    async fn list_active(&self) -> Result<Vec<IdentityRecord>, IdentityStoreError> {
        Ok(self
            .identities
            .read()
            .await
            .values()
            .filter(|record| record.is_active)
            .cloned()
            .collect())
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, IdentityStoreError> {
        let mut identities = self.identities.write().await;
        let mut purged = 0;
        for record in identities.values_mut() {
            if record
                .token_expires_at
                .is_some_and(|expires_at| expires_at <= now)
            {
                record.current_token = None;
                record.token_expires_at = None;
                purged += 1;
            }
        }
        Ok(purged)
    }
}
