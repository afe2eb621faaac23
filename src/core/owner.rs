use serde::{Deserialize, Serialize};

/// Sentinel owner key for the shared system token.
pub const SYSTEM_OWNER: &str = "system";

/// Who a token record belongs to.
///
/// The owner keys the storage location (directory or object prefix); it is not
/// part of the serialized record body.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOwner {
    /// The single shared legacy token
    System,
    /// A registered identity, keyed by email
    Identity(String),
}

impl TokenOwner {
    /// Owner for a registered identity.
    pub fn identity(email: impl Into<String>) -> Self {
        Self::Identity(email.into())
    }

    /// Canonical owner key (`system` or the email).
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => SYSTEM_OWNER,
            Self::Identity(email) => email,
        }
    }

    /// Filesystem- and object-key-safe transform of the owner key.
    ///
    /// `@` becomes `_at_`; every other non-alphanumeric character becomes `_`.
    pub fn safe_component(&self) -> String {
        let key = self.as_str();
        let mut out = String::with_capacity(key.len());
        for c in key.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c);
            } else if c == '@' {
                out.push_str("_at_");
            } else {
                out.push('_');
            }
        }
        out
    }
}

impl std::fmt::Display for TokenOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
