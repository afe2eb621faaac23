//! Scheduled rotation of the system token
//!
//! One background task ticks at the configured interval and calls
//! [`SystemTokenManager::rotate`]. The loop awaits each rotation before the
//! next tick and missed ticks are skipped, so executions never overlap; the
//! manager's own mutex serializes against manual rotations. When no async
//! runtime is available at startup the scheduler disables itself with a
//! warning and the system runs on lazy rotation alone.

use crate::manager::SystemTokenManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to the periodic rotation task.
pub struct RotationScheduler {
    handle: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    enabled: bool,
}

impl RotationScheduler {
    /// Start rotating `manager` every `interval`.
    ///
    /// Never fails: without a runtime the returned scheduler is disabled and
    /// [`is_enabled`](Self::is_enabled) reports `false`.
    pub fn start(manager: Arc<SystemTokenManager>, interval: Duration) -> Self {
        let shutdown = CancellationToken::new();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let token = shutdown.clone();
                let handle =
                    runtime.spawn(async move { run_loop(manager, interval, token).await });
                tracing::info!(interval = ?interval, "started rotation scheduler");
                Self {
                    handle: Some(handle),
                    shutdown,
                    enabled: true,
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "no async runtime available, scheduled rotation disabled; \
                     tokens rotate lazily on access"
                );
                Self {
                    handle: None,
                    shutdown,
                    enabled: false,
                }
            }
        }
    }

    /// Whether the background task is running.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop the background task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_loop(manager: Arc<SystemTokenManager>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // A slow rotation must not stack extra executions behind it
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // interval() fires immediately; the first rotation belongs at t = interval
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match manager.rotate().await {
                    Ok(_) => {
                        tracing::info!("scheduled rotation completed");
                    }
                    Err(err) => {
                        // Retried at the next tick; lazy rotation also covers
                        // the gap
                        tracing::error!(error = %err, "scheduled rotation failed");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("rotation scheduler shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LocalFileProvider, LocalProviderConfig, MockStorageProvider};
    use crate::store::CredentialStore;
    use tempfile::TempDir;

    fn system_manager() -> (Arc<SystemTokenManager>, Arc<MockStorageProvider>, TempDir) {
        let dir = TempDir::new().unwrap();
        let fallback = LocalFileProvider::new(LocalProviderConfig::new(dir.path())).unwrap();
        let mock = Arc::new(MockStorageProvider::new());
        let store = CredentialStore::new(mock.clone(), fallback);
        (
            Arc::new(SystemTokenManager::new(store, Duration::from_secs(3600))),
            mock,
            dir,
        )
    }

    #[tokio::test]
    async fn test_scheduler_rotates_on_interval() {
        let (manager, mock, _dir) = system_manager();
        let scheduler = RotationScheduler::start(Arc::clone(&manager), Duration::from_millis(50));
        assert!(scheduler.is_enabled());

        tokio::time::sleep(Duration::from_millis(180)).await;
        scheduler.shutdown().await;

        // At least two ticks fired, each persisting exactly one record
        assert!(mock.store_calls() >= 2);
    }

    #[tokio::test]
    async fn test_scheduler_does_not_fire_immediately() {
        let (manager, mock, _dir) = system_manager();
        let scheduler = RotationScheduler::start(Arc::clone(&manager), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mock.store_calls(), 0);
        scheduler.shutdown().await;
    }

    #[test]
    fn test_scheduler_disabled_outside_runtime() {
        let (manager, _mock, _dir) = {
            // Build the manager inside a throwaway runtime, then start the
            // scheduler outside any runtime
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async { system_manager() })
        };

        let scheduler = RotationScheduler::start(manager, Duration::from_secs(60));
        assert!(!scheduler.is_enabled());
    }
}
