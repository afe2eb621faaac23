//! Identity-store seam
//!
//! The relational identity store is an external collaborator: this crate
//! defines the trait and references identity records, it does not own their
//! schema. The store is the single source of truth for per-identity tokens;
//! nothing here caches them in memory.

use crate::core::{IdentityStoreError, TokenValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

#[cfg(feature = "identity-postgres")]
pub mod postgres;

pub use memory::InMemoryIdentityStore;

#[cfg(feature = "identity-postgres")]
pub use postgres::PostgresIdentityStore;

/// A registered identity and its current token state.
///
/// Invariants, enforced by [`IdentityStore`] implementations:
/// - a non-null `current_token` implies a non-null `token_expires_at`
/// - deactivating an identity nulls `current_token` and `token_expires_at`
#[derive(Clone, Debug)]
pub struct IdentityRecord {
    /// Unique key
    pub email: String,
    /// Optional display name
    pub username: Option<String>,
    /// Administrative privileges
    pub is_admin: bool,
    /// Deactivated identities cannot hold or validate tokens
    pub is_active: bool,
    /// Latest issued token value, if any
    pub current_token: Option<TokenValue>,
    /// End of the current token's validity window
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Last successful validation
    pub last_login_at: Option<DateTime<Utc>>,
}

impl IdentityRecord {
    /// A fresh, active identity with no token.
    pub fn new(email: impl Into<String>, username: Option<String>, is_admin: bool) -> Self {
        Self {
            email: email.into(),
            username,
            is_admin,
            is_active: true,
            current_token: None,
            token_expires_at: None,
            last_login_at: None,
        }
    }

    /// Whether the identity holds a token that is still inside its validity
    /// window.
    pub fn has_unexpired_token(&self) -> bool {
        match (&self.current_token, self.token_expires_at) {
            (Some(_), Some(expires_at)) => Utc::now() < expires_at,
            _ => false,
        }
    }
}

/// Async access to the external identity store.
///
/// Token-bearing updates are atomic per identity: a reader never observes
/// `current_token` and `token_expires_at` from different writes.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity. Returns `false` when the email is taken.
    async fn insert(&self, record: IdentityRecord) -> Result<bool, IdentityStoreError>;

    /// Fetch one identity by email.
    async fn get(&self, email: &str) -> Result<Option<IdentityRecord>, IdentityStoreError>;

    /// Set the identity's current token and expiry in one update. Returns
    /// `false` when no such identity exists.
    async fn set_token(
        &self,
        email: &str,
        token: &TokenValue,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, IdentityStoreError>;

    /// Null the identity's token fields unconditionally. Returns `false`
    /// when no such identity exists.
    async fn clear_token(&self, email: &str) -> Result<bool, IdentityStoreError>;

    /// Null the identity's token fields only when the stored token equals
    /// `token`. Returns whether the clear happened.
    async fn clear_token_if(&self, email: &str, token: &str) -> Result<bool, IdentityStoreError>;

    /// Record a successful validation timestamp.
    async fn touch_last_login(
        &self,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<(), IdentityStoreError>;

    /// Activate or deactivate an identity. Deactivation also nulls the token
    /// fields. Returns `false` when no such identity exists.
    async fn set_active(&self, email: &str, active: bool) -> Result<bool, IdentityStoreError>;

    /// All active identities.
    async fn list_active(&self) -> Result<Vec<IdentityRecord>, IdentityStoreError>;

    /// Null the token fields of every identity whose expiry has passed.
    /// Returns the number of identities mutated.
    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, IdentityStoreError>;
}
