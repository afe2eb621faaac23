//! Configuration surface for the credential subsystem
//!
//! One validated [`CredentialConfig`] is built at startup; the storage backend
//! is a sum type resolved exactly once into a provider instance, never
//! re-dispatched by string per call.

use crate::core::ConfigError;
use crate::providers::LocalProviderConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "object-store-azblob")]
use crate::providers::AzblobProviderConfig;
#[cfg(feature = "object-store-s3")]
use crate::providers::S3ProviderConfig;

/// Which storage backend persists token records.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum StorageSelection {
    /// Local filesystem
    #[serde(rename = "local")]
    Local(LocalProviderConfig),

    /// S3-compatible object store
    #[cfg(feature = "object-store-s3")]
    #[serde(rename = "s3")]
    S3(S3ProviderConfig),

    /// Blob-container object store
    #[cfg(feature = "object-store-azblob")]
    #[serde(rename = "azblob")]
    Azblob(AzblobProviderConfig),
}

impl StorageSelection {
    /// Short backend tag for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            #[cfg(feature = "object-store-s3")]
            Self::S3(_) => "s3",
            #[cfg(feature = "object-store-azblob")]
            Self::Azblob(_) => "azblob",
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Local(config) => config.validate(),
            #[cfg(feature = "object-store-s3")]
            Self::S3(config) => config.validate(),
            #[cfg(feature = "object-store-azblob")]
            Self::Azblob(config) => config.validate(),
        }
    }
}

/// Top-level configuration for the credential subsystem.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Storage backend selection with backend-specific settings
    pub storage: StorageSelection,

    /// Validity window and scheduled-rotation period of the shared system
    /// token
    #[serde(with = "humantime_serde", default = "default_rotation_interval")]
    pub rotation_interval: Duration,

    /// Validity window of per-identity tokens
    #[serde(with = "humantime_serde", default = "default_token_expiry")]
    pub token_expiry: Duration,

    /// Invoke the external-sync hook after each system-token rotation
    #[serde(default)]
    pub external_sync: bool,

    /// Permit the no-hint scan over active identities during validation.
    /// Transition-only; new call sites should always supply an identity hint.
    #[serde(default)]
    pub allow_identity_scan: bool,

    /// Base path for the guaranteed-available local fallback. Required when
    /// the selected backend is not already the local filesystem.
    #[serde(default)]
    pub fallback_path: Option<PathBuf>,
}

fn default_rotation_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_token_expiry() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl CredentialConfig {
    /// Local-filesystem configuration rooted at `base_path`, defaults
    /// elsewhere.
    pub fn local(base_path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageSelection::Local(LocalProviderConfig::new(base_path)),
            rotation_interval: default_rotation_interval(),
            token_expiry: default_token_expiry(),
            external_sync: false,
            allow_identity_scan: false,
            fallback_path: None,
        }
    }

    /// Base path for the local fallback provider.
    pub fn fallback_base_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.fallback_path {
            return Ok(path.clone());
        }
        match &self.storage {
            StorageSelection::Local(config) => Ok(config.base_path.clone()),
            #[allow(unreachable_patterns)]
            _ => Err(ConfigError::InvalidValue {
                field: "fallback_path".to_string(),
                reason: "required when the selected storage backend is not local".to_string(),
            }),
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;

        if self.rotation_interval < Duration::from_secs(60) {
            return Err(ConfigError::InvalidValue {
                field: "rotation_interval".to_string(),
                reason: "must be at least one minute".to_string(),
            });
        }
        if self.token_expiry.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "token_expiry".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }

        if let Some(path) = &self.fallback_path {
            if !path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: "fallback_path".to_string(),
                    reason: "must be an absolute path".to_string(),
                });
            }
        } else {
            // Surfaces the missing-fallback case at validation time instead of
            // first failover.
            self.fallback_base_path()?;
        }

        Ok(())
    }
}
