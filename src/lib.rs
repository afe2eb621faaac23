//! Tessera Credential
//!
//! Bearer-token lifecycle management for the Tessera admin backend:
//! issuance, validation, rotation, and durable multi-backend persistence.
//!
//! # Features
//!
//! - **Secure token generation** - 256-bit values from a CSPRNG, zeroed on
//!   drop, compared in constant time
//! - **Pluggable persistence** - local filesystem, S3-compatible, and
//!   blob-container backends behind one provider trait
//! - **Transparent fallback** - an unavailable backend degrades to the local
//!   filesystem instead of breaking issuance
//! - **Two coexisting regimes** - one shared legacy system token plus one
//!   token per registered identity
//! - **Single-flight rotation** - scheduled or lazy, never concurrent,
//!   surviving process restarts
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera_credential::config::CredentialConfig;
//! use tessera_credential::identity::InMemoryIdentityStore;
//! use tessera_credential::service::CredentialService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CredentialConfig::local("/var/lib/tessera/tokens");
//! let service = CredentialService::builder(config, Arc::new(InMemoryIdentityStore::new()))
//!     .init()
//!     .await?;
//!
//! let token = service.system_tokens().get_current().await?;
//! assert!(service.system_tokens().validate(token.expose()).await?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![forbid(unsafe_code)]

/// Configuration surface
pub mod config;
/// Core types, errors, and primitives
pub mod core;
/// Request-side credential extraction
pub mod extract;
/// Outbound collaborator seams
pub mod hooks;
/// Identity-store seam and implementations
pub mod identity;
/// Token managers for the two authentication regimes
pub mod manager;
/// Storage provider implementations
pub mod providers;
/// Scheduled rotation
pub mod rotation;
/// Service lifecycle
pub mod service;
/// Store façade with local fallback
pub mod store;
/// Dual-regime request authentication
pub mod validator;

/// Commonly used types and traits
pub mod prelude {
    pub use crate::config::{CredentialConfig, StorageSelection};
    pub use crate::core::{
        AuthTokenError, IdentityAuthError, StorageError, TokenOwner, TokenRecord, TokenValue,
    };
    pub use crate::extract::{ExtractedCredentials, extract_credentials};
    pub use crate::hooks::{SyncHook, TokenNotifier};
    pub use crate::identity::{IdentityRecord, IdentityStore};
    pub use crate::manager::{IdentityTokenManager, SystemTokenManager};
    pub use crate::providers::StorageProvider;
    pub use crate::rotation::RotationScheduler;
    pub use crate::service::CredentialService;
    pub use crate::store::CredentialStore;
    pub use crate::validator::{AuthContext, AuthFailure, TokenAuthenticator};
    pub use async_trait::async_trait;
}

// Re-export commonly used external types
pub use chrono::{DateTime, Utc};
