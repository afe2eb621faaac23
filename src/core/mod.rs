//! Core types, errors, and primitives

pub mod error;
pub mod owner;
pub mod record;
pub mod token;

pub use error::{
    AuthTokenError, ConfigError, IdentityAuthError, IdentityStoreError, RecordError, StorageError,
};
pub use owner::{SYSTEM_OWNER, TokenOwner};
pub use record::TokenRecord;
pub use token::{TOKEN_BYTES, TOKEN_LEN, TokenValue};
