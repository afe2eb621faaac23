//! Outbound collaborator seams
//!
//! Both hooks are single-method capabilities handed in at construction time.
//! They are strictly best-effort: the managers catch and log failures at the
//! call site, and a failing hook never affects the operation that triggered
//! it.

use async_trait::async_trait;

/// Error type hooks may return; the caller only logs it.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Invoked after each successful system-token rotation so an external
/// consumer (deploy tooling, peer service) can pick up the new value.
#[async_trait]
pub trait SyncHook: Send + Sync {
    /// Receive the freshly rotated token and where it was persisted.
    async fn sync(&self, token_value: &str, storage_location: &str) -> Result<(), HookError>;
}

/// Delivers a freshly issued per-identity token to its owner. Transport is
/// the collaborator's business.
#[async_trait]
pub trait TokenNotifier: Send + Sync {
    /// Notify `email` of its new token.
    async fn notify(
        &self,
        email: &str,
        token: &str,
        username: Option<&str>,
        is_new_identity: bool,
    ) -> Result<(), HookError>;
}
