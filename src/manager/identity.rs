//! Per-identity token manager
//!
//! One token per registered identity, email-keyed. The identity store is the
//! single source of truth: every validation re-reads it and nothing is cached
//! here. Durable storage copies and owner notification are both optional and
//! best-effort.

use crate::core::{IdentityAuthError, TokenOwner, TokenRecord, TokenValue};
use crate::hooks::TokenNotifier;
use crate::identity::{IdentityRecord, IdentityStore};
use crate::store::CredentialStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Manager for per-identity bearer tokens.
pub struct IdentityTokenManager {
    identities: Arc<dyn IdentityStore>,
    durable_store: Option<CredentialStore>,
    notifier: Option<Arc<dyn TokenNotifier>>,
    token_expiry: Duration,
}

impl IdentityTokenManager {
    /// Create a manager over the identity store, issuing tokens valid for
    /// `token_expiry`.
    pub fn new(identities: Arc<dyn IdentityStore>, token_expiry: Duration) -> Self {
        Self {
            identities,
            durable_store: None,
            notifier: None,
            token_expiry,
        }
    }

    /// Also persist a durable copy of each issued token.
    pub fn with_durable_store(mut self, store: CredentialStore) -> Self {
        self.durable_store = Some(store);
        self
    }

    /// Attach the notification collaborator for issued tokens.
    pub fn with_notifier(mut self, notifier: Arc<dyn TokenNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Register a new identity.
    ///
    /// With `notify`, an initial token is issued immediately and the
    /// notification collaborator is invoked with `is_new_identity = true`.
    /// Notification failure never rolls back the registration.
    pub async fn add_identity(
        &self,
        email: &str,
        username: Option<String>,
        is_admin: bool,
        notify: bool,
    ) -> Result<IdentityRecord, IdentityAuthError> {
        let record = IdentityRecord::new(email, username.clone(), is_admin);
        let inserted = self.identities.insert(record).await?;
        if !inserted {
            return Err(IdentityAuthError::DuplicateIdentity {
                email: email.to_string(),
            });
        }

        tracing::info!(email = %email, is_admin, "registered identity");

        if notify {
            let token = self.issue(email, false).await?;
            self.fire_notify(email, &token, username.as_deref(), true)
                .await;
        }

        // Re-read so the returned record reflects any initial token
        self.identities
            .get(email)
            .await?
            .ok_or_else(|| IdentityAuthError::IdentityNotFound {
                email: email.to_string(),
            })
    }

    /// Issue a new token for an active identity, replacing any previous one.
    pub async fn issue_token(
        &self,
        email: &str,
        notify: bool,
    ) -> Result<TokenValue, IdentityAuthError> {
        self.issue(email, notify).await
    }

    /// Check `candidate` against the identity's current token.
    ///
    /// False for empty inputs, unknown or inactive identities, mismatched
    /// tokens, and expired windows. A successful validation updates
    /// `last_login_at`; that write failing never affects the result.
    pub async fn validate(&self, email: &str, candidate: &str) -> Result<bool, IdentityAuthError> {
        Ok(self.validated_identity(email, candidate).await?.is_some())
    }

    /// [`validate`](Self::validate), returning the matched identity record.
    pub async fn validated_identity(
        &self,
        email: &str,
        candidate: &str,
    ) -> Result<Option<IdentityRecord>, IdentityAuthError> {
        if email.is_empty() || candidate.is_empty() {
            return Ok(None);
        }

        let Some(record) = self.identities.get(email).await? else {
            return Ok(None);
        };
        if !record.is_active || !record.has_unexpired_token() {
            return Ok(None);
        }
        let matches = record
            .current_token
            .as_ref()
            .is_some_and(|token| token.matches(candidate));
        if !matches {
            return Ok(None);
        }

        if let Err(err) = self.identities.touch_last_login(email, Utc::now()).await {
            tracing::warn!(email = %email, error = %err, "failed to update last_login_at");
        }
        Ok(Some(record))
    }

    /// Null the identity's token, but only when `candidate` equals the stored
    /// current token. A mismatch returns `false` without mutating state.
    pub async fn invalidate_token(
        &self,
        email: &str,
        candidate: &str,
    ) -> Result<bool, IdentityAuthError> {
        if email.is_empty() || candidate.is_empty() {
            return Ok(false);
        }
        let cleared = self.identities.clear_token_if(email, candidate).await?;
        if cleared {
            tracing::info!(email = %email, "invalidated identity token");
        }
        Ok(cleared)
    }

    /// Issue a replacement token, returning `None` instead of failing when
    /// the identity is missing or inactive. For best-effort callers.
    pub async fn rotate(&self, email: &str) -> Result<Option<TokenValue>, IdentityAuthError> {
        match self.issue(email, false).await {
            Ok(token) => Ok(Some(token)),
            Err(IdentityAuthError::IdentityNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Null the token of every identity whose expiry has passed. Returns the
    /// number of identities mutated.
    pub async fn purge_expired(&self) -> Result<u64, IdentityAuthError> {
        let purged = self.identities.purge_expired_tokens(Utc::now()).await?;
        if purged > 0 {
            tracing::info!(purged, "purged expired identity tokens");
        }
        Ok(purged)
    }

    /// Deactivate an identity, nulling its token fields.
    pub async fn deactivate(&self, email: &str) -> Result<bool, IdentityAuthError> {
        let deactivated = self.identities.set_active(email, false).await?;
        if deactivated {
            tracing::info!(email = %email, "deactivated identity");
        }
        Ok(deactivated)
    }

    /// Scan all active identities for one whose current token matches
    /// `candidate`.
    ///
    /// Transition-only compatibility path for legacy clients that cannot
    /// supply an identity hint; it is O(active identities) per call. New call
    /// sites must use [`validate`](Self::validate) with an email instead.
    pub async fn validate_any(
        &self,
        candidate: &str,
    ) -> Result<Option<IdentityRecord>, IdentityAuthError> {
        if candidate.is_empty() {
            return Ok(None);
        }
        for record in self.identities.list_active().await? {
            if !record.has_unexpired_token() {
                continue;
            }
            let matches = record
                .current_token
                .as_ref()
                .is_some_and(|token| token.matches(candidate));
            if matches {
                if let Err(err) = self
                    .identities
                    .touch_last_login(&record.email, Utc::now())
                    .await
                {
                    tracing::warn!(email = %record.email, error = %err, "failed to update last_login_at");
                }
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn issue(&self, email: &str, notify: bool) -> Result<TokenValue, IdentityAuthError> {
        let Some(record) = self.identities.get(email).await? else {
            return Err(IdentityAuthError::IdentityNotFound {
                email: email.to_string(),
            });
        };
        if !record.is_active {
            return Err(IdentityAuthError::IdentityNotFound {
                email: email.to_string(),
            });
        }

        let issued = TokenRecord::issue(self.token_expiry);
        let updated = self
            .identities
            .set_token(email, &issued.value, issued.expires_at)
            .await?;
        if !updated {
            return Err(IdentityAuthError::IdentityNotFound {
                email: email.to_string(),
            });
        }

        tracing::info!(email = %email, expires_at = %issued.expires_at, "issued identity token");

        if let Some(store) = &self.durable_store {
            let owner = TokenOwner::identity(email);
            if let Err(err) = store.store_token(&owner, &issued).await {
                tracing::warn!(email = %email, error = %err, "failed to persist durable token copy");
            }
        }

        if notify {
            self.fire_notify(email, &issued.value, record.username.as_deref(), false)
                .await;
        }

        Ok(issued.value)
    }

    async fn fire_notify(
        &self,
        email: &str,
        token: &TokenValue,
        username: Option<&str>,
        is_new_identity: bool,
    ) {
        if let Some(notifier) = &self.notifier {
            if let Err(err) = notifier
                .notify(email, token.expose(), username, is_new_identity)
                .await
            {
                tracing::warn!(email = %email, error = %err, "token notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityStore;

    fn manager() -> (IdentityTokenManager, Arc<InMemoryIdentityStore>) {
        let store = Arc::new(InMemoryIdentityStore::new());
        let manager =
            IdentityTokenManager::new(store.clone(), Duration::from_secs(24 * 60 * 60));
        (manager, store)
    }

    #[tokio::test]
    async fn test_add_identity_rejects_duplicate() {
        let (manager, _store) = manager();
        manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap();
        let err = manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityAuthError::DuplicateIdentity { .. }));
    }

    #[tokio::test]
    async fn test_issue_token_unknown_identity() {
        let (manager, _store) = manager();
        let err = manager.issue_token("ghost@example.com", false).await.unwrap_err();
        assert!(matches!(err, IdentityAuthError::IdentityNotFound { .. }));
    }

    #[tokio::test]
    async fn test_issue_token_inactive_identity() {
        let (manager, _store) = manager();
        manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap();
        manager.deactivate("a@example.com").await.unwrap();

        let err = manager.issue_token("a@example.com", false).await.unwrap_err();
        assert!(matches!(err, IdentityAuthError::IdentityNotFound { .. }));
    }

    #[tokio::test]
    async fn test_issue_validate_invalidate_cycle() {
        let (manager, _store) = manager();
        manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap();

        let token = manager.issue_token("a@example.com", false).await.unwrap();
        let value = token.expose().to_string();

        assert!(manager.validate("a@example.com", &value).await.unwrap());
        assert!(manager.invalidate_token("a@example.com", &value).await.unwrap());
        assert!(!manager.validate("a@example.com", &value).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_requires_matching_token() {
        let (manager, store) = manager();
        manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap();
        let token = manager.issue_token("a@example.com", false).await.unwrap();

        assert!(
            !manager
                .invalidate_token("a@example.com", "stale-token")
                .await
                .unwrap()
        );
        let record = store.get("a@example.com").await.unwrap().unwrap();
        assert!(record.current_token.is_some());
        assert!(manager.validate("a@example.com", token.expose()).await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_rejects_empty_inputs() {
        let (manager, _store) = manager();
        assert!(!manager.validate("", "token").await.unwrap());
        assert!(!manager.validate("a@example.com", "").await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_updates_last_login() {
        let (manager, store) = manager();
        manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap();
        let token = manager.issue_token("a@example.com", false).await.unwrap();

        assert!(store.get("a@example.com").await.unwrap().unwrap().last_login_at.is_none());
        manager.validate("a@example.com", token.expose()).await.unwrap();
        assert!(store.get("a@example.com").await.unwrap().unwrap().last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_rotate_missing_identity_returns_none() {
        let (manager, _store) = manager();
        assert!(manager.rotate("ghost@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_replaces_token() {
        let (manager, _store) = manager();
        manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap();
        let old = manager.issue_token("a@example.com", false).await.unwrap();
        let new = manager.rotate("a@example.com").await.unwrap().unwrap();

        assert_ne!(old.expose(), new.expose());
        assert!(!manager.validate("a@example.com", old.expose()).await.unwrap());
        assert!(manager.validate("a@example.com", new.expose()).await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_any_scan() {
        let (manager, _store) = manager();
        manager
            .add_identity("a@example.com", None, false, false)
            .await
            .unwrap();
        manager
            .add_identity("b@example.com", None, true, false)
            .await
            .unwrap();
        let token = manager.issue_token("b@example.com", false).await.unwrap();

        let matched = manager.validate_any(token.expose()).await.unwrap().unwrap();
        assert_eq!(matched.email, "b@example.com");
        assert!(matched.is_admin);

        assert!(manager.validate_any("unknown").await.unwrap().is_none());
        assert!(manager.validate_any("").await.unwrap().is_none());
    }
}
