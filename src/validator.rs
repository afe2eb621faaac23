//! Dual-regime request authentication
//!
//! [`TokenAuthenticator`] chains the two validation regimes: per-identity
//! first (O(1) with an identity hint, optionally the deprecated scan without
//! one), then the shared system token. The first match wins and produces a
//! normalized [`AuthContext`].
//!
//! "Not authenticated" and "backend unavailable" are distinct failures so the
//! request boundary can answer 401 versus 503 correctly.

use crate::core::{AuthTokenError, IdentityAuthError};
use crate::manager::{IdentityTokenManager, SystemTokenManager};
use std::sync::Arc;
use thiserror::Error;

/// Normalized result of a successful authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    /// Authenticated identity; `None` for the shared system token
    pub email: Option<String>,
    /// Administrative privileges
    pub is_admin: bool,
    /// Matched the legacy system token rather than a per-identity token
    pub is_legacy: bool,
}

impl AuthContext {
    /// Context produced by a system-token match. Admin-equivalent for
    /// backward compatibility.
    fn legacy() -> Self {
        Self {
            email: None,
            is_admin: true,
            is_legacy: true,
        }
    }
}

/// Why a request could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// No regime matched the candidate token
    #[error("authentication required")]
    Unauthenticated,

    /// Infrastructure failure while validating; distinct from a bad token
    #[error("authentication backend unavailable: {source}")]
    Unavailable {
        /// Underlying infrastructure error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<IdentityAuthError> for AuthFailure {
    fn from(source: IdentityAuthError) -> Self {
        Self::Unavailable {
            source: Box::new(source),
        }
    }
}

impl From<AuthTokenError> for AuthFailure {
    fn from(source: AuthTokenError) -> Self {
        Self::Unavailable {
            source: Box::new(source),
        }
    }
}

/// Request-facing entry point chaining both token regimes.
pub struct TokenAuthenticator {
    identity: Arc<IdentityTokenManager>,
    system: Arc<SystemTokenManager>,
    allow_identity_scan: bool,
}

impl TokenAuthenticator {
    /// Create an authenticator over both managers. The no-hint identity scan
    /// starts disabled.
    pub fn new(identity: Arc<IdentityTokenManager>, system: Arc<SystemTokenManager>) -> Self {
        Self {
            identity,
            system,
            allow_identity_scan: false,
        }
    }

    /// Permit the deprecated no-hint scan over active identities for legacy
    /// clients.
    pub fn with_identity_scan(mut self, allow: bool) -> Self {
        self.allow_identity_scan = allow;
        self
    }

    /// Authenticate a candidate token, with an optional identity hint for
    /// O(1) per-identity validation.
    pub async fn authenticate(
        &self,
        candidate: &str,
        identity_hint: Option<&str>,
    ) -> Result<AuthContext, AuthFailure> {
        if candidate.is_empty() {
            return Err(AuthFailure::Unauthenticated);
        }

        match identity_hint.filter(|hint| !hint.is_empty()) {
            Some(hint) => {
                if let Some(record) = self.identity.validated_identity(hint, candidate).await? {
                    return Ok(AuthContext {
                        email: Some(record.email),
                        is_admin: record.is_admin,
                        is_legacy: false,
                    });
                }
            }
            None if self.allow_identity_scan => {
                if let Some(record) = self.identity.validate_any(candidate).await? {
                    return Ok(AuthContext {
                        email: Some(record.email),
                        is_admin: record.is_admin,
                        is_legacy: false,
                    });
                }
            }
            None => {}
        }

        if self.system.validate(candidate).await? {
            return Ok(AuthContext::legacy());
        }

        Err(AuthFailure::Unauthenticated)
    }
}
