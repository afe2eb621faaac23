//! Error types for token lifecycle operations
//!
//! Four layers, matching the boundaries of the crate:
//! - [`StorageError`]: provider-level persistence failures, absorbed by the
//!   store façade's local fallback and never surfaced to validators
//! - [`RecordError`]: malformed persisted token records
//! - [`AuthTokenError`]: system-token regime infrastructure failures
//! - [`IdentityAuthError`]: per-identity regime failures (duplicate identity,
//!   unknown identity, identity-store infrastructure)
//!
//! "Not authenticated" is never an error anywhere in this crate; validation
//! paths report it as a boolean or `Option` result.

use std::time::Duration;
use thiserror::Error;

/// Storage provider operation errors.
///
/// Raised by individual providers; callers going through
/// [`CredentialStore`](crate::store::CredentialStore) only ever observe these
/// from explicit health probes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No token record exists for the owner
    #[error("no token record for owner '{owner}'")]
    NotFound {
        /// Owner key
        owner: String,
    },

    /// Failed to read a token record
    #[error("failed to read token record for '{owner}': {source}")]
    ReadFailure {
        /// Owner key
        owner: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a token record
    #[error("failed to write token record for '{owner}': {source}")]
    WriteFailure {
        /// Owner key
        owner: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Permission denied by the backing store
    #[error("permission denied for owner '{owner}'")]
    PermissionDenied {
        /// Owner key
        owner: String,
    },

    /// Remote backend rejected or failed the operation
    #[error("storage backend error for '{owner}': {message}")]
    Backend {
        /// Owner key
        owner: String,
        /// Backend-reported failure
        message: String,
    },

    /// Operation exceeded the provider timeout
    #[error("storage operation timed out after {duration:?}")]
    Timeout {
        /// Configured timeout
        duration: Duration,
    },
}

impl StorageError {
    /// Owner key the failed operation was addressed to, when known.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::NotFound { owner }
            | Self::ReadFailure { owner, .. }
            | Self::WriteFailure { owner, .. }
            | Self::PermissionDenied { owner }
            | Self::Backend { owner, .. } => Some(owner),
            Self::Timeout { .. } => None,
        }
    }
}

/// Errors from parsing a persisted token record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// A required field is absent
    #[error("token record is missing required field '{field}'")]
    MissingField {
        /// Field name
        field: &'static str,
    },

    /// A timestamp field could not be parsed as ISO-8601
    #[error("token record field '{field}' has invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },
}

/// System-token regime errors.
///
/// Only infrastructure failures appear here; an unmatched candidate token is a
/// `false` from `validate`, not an error.
#[derive(Debug, Error)]
pub enum AuthTokenError {
    /// Token could not be persisted, including via the local fallback
    #[error("failed to persist token: {source}")]
    Persistence {
        /// Final storage error after fallback
        #[source]
        source: StorageError,
    },

    /// A persisted record could not be decoded
    #[error("failed to decode persisted token record: {source}")]
    Codec {
        /// Underlying record error
        #[source]
        source: RecordError,
    },
}

/// Identity-store infrastructure errors.
///
/// The relational identity store is an external collaborator; these wrap its
/// failures without leaking driver types across the seam.
#[derive(Debug, Error)]
pub enum IdentityStoreError {
    /// Store is unreachable
    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    /// Store rejected the operation
    #[error("identity store query failed: {0}")]
    Query(String),
}

/// Per-identity regime errors.
#[derive(Debug, Error)]
pub enum IdentityAuthError {
    /// An identity with this email already exists
    #[error("identity '{email}' already exists")]
    DuplicateIdentity {
        /// Conflicting email
        email: String,
    },

    /// No active identity matches this email
    #[error("no active identity for '{email}'")]
    IdentityNotFound {
        /// Requested email
        email: String,
    },

    /// Identity store infrastructure failure
    #[error("identity store failure: {source}")]
    Store {
        /// Underlying store error
        #[source]
        source: IdentityStoreError,
    },
}

impl From<IdentityStoreError> for IdentityAuthError {
    fn from(source: IdentityStoreError) -> Self {
        Self::Store { source }
    }
}

impl From<RecordError> for AuthTokenError {
    fn from(source: RecordError) -> Self {
        Self::Codec { source }
    }
}

/// Configuration validation errors, detected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The selected storage provider was not compiled into this build
    #[error("storage provider '{name}' is not available in this build")]
    UnsupportedProvider {
        /// Provider tag from configuration
        name: String,
    },
}
