//! Storage provider implementations for token persistence
//!
//! Every backend implements the same [`StorageProvider`] contract: one current
//! token record per owner, written all-or-nothing, addressed by an
//! owner-derived key. Remote backends are feature-gated; the local filesystem
//! provider is always compiled in because the store façade uses it as the
//! fallback of last resort.

use crate::core::{StorageError, TokenOwner, TokenRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// In-memory provider for tests (always available)
pub mod mock;

// Local filesystem storage (always available; fallback target)
pub mod local;

// S3-compatible object storage
#[cfg(feature = "object-store-s3")]
pub mod s3;

// Blob-container object storage
#[cfg(feature = "object-store-azblob")]
pub mod azblob;

pub mod metrics;

pub use local::{LocalFileProvider, LocalProviderConfig};
pub use metrics::StorageMetrics;
pub use mock::MockStorageProvider;

#[cfg(feature = "object-store-s3")]
pub use s3::{S3ObjectProvider, S3ProviderConfig};

#[cfg(feature = "object-store-azblob")]
pub use azblob::{AzblobObjectProvider, AzblobProviderConfig};

/// What a delete call should remove for an owner.
#[derive(Clone, Copy, Debug)]
pub enum DeleteScope<'a> {
    /// Every stored record for the owner
    All,
    /// A single location previously returned by `store` or `list`
    Location(&'a str),
}

/// Pluggable token persistence backend.
///
/// All operations are owner-scoped. `store` must be atomic from a concurrent
/// reader's perspective: either the full record is visible or nothing is.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Write a new record for the owner; returns the storage location.
    async fn store(&self, owner: &TokenOwner, record: &TokenRecord)
    -> Result<String, StorageError>;

    /// Load the most recently stored record for the owner.
    async fn load_latest(&self, owner: &TokenOwner) -> Result<TokenRecord, StorageError>;

    /// List stored record locations for the owner, oldest first.
    async fn list(&self, owner: &TokenOwner) -> Result<Vec<String>, StorageError>;

    /// Remove records for the owner. Returns whether anything was removed.
    async fn delete(&self, owner: &TokenOwner, scope: DeleteScope<'_>)
    -> Result<bool, StorageError>;

    /// Probe backend availability. Never raises.
    async fn health_check(&self) -> bool;

    /// Short backend tag for logs.
    fn name(&self) -> &'static str;
}

/// Record file name for an owner at an issuance time:
/// `token_<safe-owner>_<YYYYMMDD_HHMMSS>.txt`.
///
/// The embedded timestamp gives lexicographic listings a natural
/// oldest-to-newest order.
pub(crate) fn record_file_name(owner: &TokenOwner, at: DateTime<Utc>) -> String {
    format!(
        "token_{}_{}.txt",
        owner.safe_component(),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Whether a file/object name looks like a token record.
pub(crate) fn is_record_file_name(name: &str) -> bool {
    name.starts_with("token_") && name.ends_with(".txt")
}
