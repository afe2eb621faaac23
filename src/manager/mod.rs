//! Token managers for the two authentication regimes
//!
//! [`SystemTokenManager`] owns the single shared legacy token;
//! [`IdentityTokenManager`] issues one token per registered identity. The two
//! regimes coexist permanently and keep separate data models: the system
//! token has no identity-store row, and per-identity tokens are never cached
//! in memory.

pub mod identity;
pub mod system;

pub use identity::IdentityTokenManager;
pub use system::SystemTokenManager;
