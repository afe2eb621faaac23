//! Service lifecycle
//!
//! [`CredentialService`] wires the whole subsystem together from validated
//! configuration: store façade, both token managers, the authenticator, and
//! the rotation scheduler. Request handlers receive the handle by injection;
//! there is no module-level state.

use crate::config::CredentialConfig;
use crate::core::ConfigError;
use crate::hooks::{SyncHook, TokenNotifier};
use crate::identity::IdentityStore;
use crate::manager::{IdentityTokenManager, SystemTokenManager};
use crate::rotation::RotationScheduler;
use crate::store::CredentialStore;
use crate::validator::TokenAuthenticator;
use std::sync::Arc;

/// Builder for [`CredentialService`].
pub struct CredentialServiceBuilder {
    config: CredentialConfig,
    identities: Arc<dyn IdentityStore>,
    sync_hook: Option<Arc<dyn SyncHook>>,
    notifier: Option<Arc<dyn TokenNotifier>>,
}

impl CredentialServiceBuilder {
    /// Attach the external-sync hook. Only invoked when the configuration
    /// enables `external_sync`.
    pub fn with_sync_hook(mut self, hook: Arc<dyn SyncHook>) -> Self {
        self.sync_hook = Some(hook);
        self
    }

    /// Attach the token notification collaborator.
    pub fn with_notifier(mut self, notifier: Arc<dyn TokenNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate the configuration and bring the subsystem up.
    pub async fn init(self) -> Result<CredentialService, ConfigError> {
        self.config.validate()?;

        let store = CredentialStore::from_config(&self.config).await?;

        let mut system = SystemTokenManager::new(store.clone(), self.config.rotation_interval);
        if self.config.external_sync {
            match &self.sync_hook {
                Some(hook) => system = system.with_sync_hook(Arc::clone(hook)),
                None => {
                    tracing::warn!("external_sync enabled but no sync hook was provided");
                }
            }
        }
        let system = Arc::new(system);

        let mut identity = IdentityTokenManager::new(self.identities, self.config.token_expiry)
            .with_durable_store(store.clone());
        if let Some(notifier) = &self.notifier {
            identity = identity.with_notifier(Arc::clone(notifier));
        }
        let identity = Arc::new(identity);

        let authenticator = TokenAuthenticator::new(Arc::clone(&identity), Arc::clone(&system))
            .with_identity_scan(self.config.allow_identity_scan);

        let scheduler =
            RotationScheduler::start(Arc::clone(&system), self.config.rotation_interval);

        tracing::info!(
            provider = store.provider_name(),
            rotation_enabled = scheduler.is_enabled(),
            "credential service initialized"
        );

        Ok(CredentialService {
            store,
            system,
            identity,
            authenticator,
            scheduler,
        })
    }
}

/// Handle owning the assembled credential subsystem.
pub struct CredentialService {
    store: CredentialStore,
    system: Arc<SystemTokenManager>,
    identity: Arc<IdentityTokenManager>,
    authenticator: TokenAuthenticator,
    scheduler: RotationScheduler,
}

impl CredentialService {
    /// Start building a service over the given identity store.
    pub fn builder(
        config: CredentialConfig,
        identities: Arc<dyn IdentityStore>,
    ) -> CredentialServiceBuilder {
        CredentialServiceBuilder {
            config,
            identities,
            sync_hook: None,
            notifier: None,
        }
    }

    /// Request-facing authenticator.
    pub fn authenticator(&self) -> &TokenAuthenticator {
        &self.authenticator
    }

    /// Shared system-token manager.
    pub fn system_tokens(&self) -> &Arc<SystemTokenManager> {
        &self.system
    }

    /// Per-identity token manager.
    pub fn identity_tokens(&self) -> &Arc<IdentityTokenManager> {
        &self.identity
    }

    /// Token persistence façade.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Whether scheduled rotation is running (false means lazy-only).
    pub fn rotation_enabled(&self) -> bool {
        self.scheduler.is_enabled()
    }

    /// Stop background work and release the handle.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        tracing::info!("credential service shut down");
    }
}
