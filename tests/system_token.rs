//! Integration tests for the shared system-token lifecycle

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tessera_credential::core::TokenOwner;
use tessera_credential::manager::SystemTokenManager;
use tessera_credential::providers::{LocalFileProvider, LocalProviderConfig};
use tessera_credential::store::CredentialStore;

fn local_store(dir: &TempDir) -> CredentialStore {
    let fallback = LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap();
    let primary = Arc::new(LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap());
    CredentialStore::new(primary, fallback)
}

#[tokio::test]
async fn test_expired_token_is_replaced_on_access() {
    let dir = TempDir::new().unwrap();
    let manager = SystemTokenManager::new(local_store(&dir), Duration::from_millis(100));

    let first = manager.get_current().await.unwrap().expose().to_string();
    assert!(manager.validate(&first).await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;

    let second = manager.get_current().await.unwrap().expose().to_string();
    assert_ne!(first, second);
    assert!(!manager.validate(&first).await.unwrap());
    assert!(manager.validate(&second).await.unwrap());
}

#[tokio::test]
async fn test_token_survives_process_restart() {
    let dir = TempDir::new().unwrap();

    let token = {
        let manager = SystemTokenManager::new(local_store(&dir), Duration::from_secs(3600));
        manager.get_current().await.unwrap().expose().to_string()
    };

    // A new manager over the same storage plays the role of a restarted
    // process: it must adopt the persisted record, not mint a new one
    let manager = SystemTokenManager::new(local_store(&dir), Duration::from_secs(3600));
    let adopted = manager.get_current().await.unwrap();
    assert_eq!(adopted.expose(), token);
    assert!(manager.validate(&token).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_start_issues_one_token() {
    let dir = TempDir::new().unwrap();
    let store = local_store(&dir);
    let manager = Arc::new(SystemTokenManager::new(store.clone(), Duration::from_secs(3600)));

    let tasks: Vec<_> = (0..24)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_current().await.unwrap() })
        })
        .collect();

    let mut values = Vec::with_capacity(tasks.len());
    for task in tasks {
        values.push(task.await.unwrap().expose().to_string());
    }

    let first = &values[0];
    assert!(values.iter().all(|v| v == first));

    // Exactly one record was persisted across all callers
    let locations = store.list_tokens(&TokenOwner::System).await.unwrap();
    assert_eq!(locations.len(), 1);
}

#[tokio::test]
async fn test_forced_rotation_persists_new_record() {
    let dir = TempDir::new().unwrap();
    let store = local_store(&dir);
    let manager = SystemTokenManager::new(store.clone(), Duration::from_secs(3600));

    let first = manager.get_current().await.unwrap().expose().to_string();
    let second = manager.rotate().await.unwrap().expose().to_string();
    assert_ne!(first, second);

    // Both rotations left their timestamped records behind; the newest wins
    let loaded = store
        .load_latest_token(&TokenOwner::System)
        .await
        .expect("record present");
    // Same-second rotations share a file name, so allow one or two records
    let count = store.list_tokens(&TokenOwner::System).await.unwrap().len();
    assert!((1..=2).contains(&count));
    assert_eq!(loaded.value.expose(), second);
}
