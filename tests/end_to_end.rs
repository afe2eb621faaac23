//! End-to-end: service wiring, header extraction, dual-regime authentication

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tessera_credential::config::CredentialConfig;
use tessera_credential::core::{IdentityStoreError, TokenValue};
use tessera_credential::extract::extract_credentials;
use tessera_credential::identity::{IdentityRecord, IdentityStore, InMemoryIdentityStore};
use tessera_credential::manager::{IdentityTokenManager, SystemTokenManager};
use tessera_credential::providers::{LocalFileProvider, LocalProviderConfig, MockStorageProvider};
use tessera_credential::service::CredentialService;
use tessera_credential::store::CredentialStore;
use tessera_credential::validator::{AuthFailure, TokenAuthenticator};

async fn service(dir: &TempDir) -> CredentialService {
    let config = CredentialConfig::local(dir.path());
    CredentialService::builder(config, Arc::new(InMemoryIdentityStore::new()))
        .init()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_request_flow_with_identity_hint() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    service
        .identity_tokens()
        .add_identity("a@example.com", Some("Alex".to_string()), true, false)
        .await
        .unwrap();
    let token = service
        .identity_tokens()
        .issue_token("a@example.com", false)
        .await
        .unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token.expose())).unwrap(),
    );
    headers.insert("x-auth-user", HeaderValue::from_static("a@example.com"));

    let credentials = extract_credentials(&headers).unwrap();
    let context = service
        .authenticator()
        .authenticate(&credentials.token, credentials.identity_hint.as_deref())
        .await
        .unwrap();

    assert_eq!(context.email.as_deref(), Some("a@example.com"));
    assert!(context.is_admin);
    assert!(!context.is_legacy);

    service.shutdown().await;
}

#[tokio::test]
async fn test_request_flow_with_legacy_cookie() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir).await;

    let token = service.system_tokens().get_current().await.unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        HeaderValue::from_str(&format!("tessera_token={}", token.expose())).unwrap(),
    );

    let credentials = extract_credentials(&headers).unwrap();
    assert!(credentials.identity_hint.is_none());

    let context = service
        .authenticator()
        .authenticate(&credentials.token, None)
        .await
        .unwrap();
    assert!(context.is_legacy);
    assert!(context.is_admin);

    service.shutdown().await;
}

#[tokio::test]
async fn test_missing_token_yields_no_credentials() {
    let headers = HeaderMap::new();
    assert!(extract_credentials(&headers).is_none());
}

/// Identity store that refuses every call, standing in for an unreachable
/// database.
struct DownIdentityStore;

#[async_trait]
impl IdentityStore for DownIdentityStore {
    async fn insert(&self, _record: IdentityRecord) -> Result<bool, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn get(&self, _email: &str) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn set_token(
        &self,
        _email: &str,
        _token: &TokenValue,
        _expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn clear_token(&self, _email: &str) -> Result<bool, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn clear_token_if(&self, _email: &str, _token: &str) -> Result<bool, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn touch_last_login(
        &self,
        _email: &str,
        _at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn set_active(&self, _email: &str, _active: bool) -> Result<bool, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn list_active(&self) -> Result<Vec<IdentityRecord>, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
    async fn purge_expired_tokens(
        &self,
        _now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, IdentityStoreError> {
        Err(IdentityStoreError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_infrastructure_failure_is_unavailable_not_unauthenticated() {
    let dir = TempDir::new().unwrap();
    let fallback = LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap();
    let store = CredentialStore::new(Arc::new(MockStorageProvider::new()), fallback);
    let system = Arc::new(SystemTokenManager::new(store, Duration::from_secs(3600)));
    let identity = Arc::new(IdentityTokenManager::new(
        Arc::new(DownIdentityStore),
        Duration::from_secs(3600),
    ));
    let authenticator = TokenAuthenticator::new(identity, system);

    let err = authenticator
        .authenticate("some-token", Some("a@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthFailure::Unavailable { .. }));

    // A plain bad token without the broken hint path stays "unauthenticated"
    let err = authenticator.authenticate("some-token", None).await.unwrap_err();
    assert!(matches!(err, AuthFailure::Unauthenticated));
}
