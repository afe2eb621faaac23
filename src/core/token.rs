use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Raw entropy drawn per token.
pub const TOKEN_BYTES: usize = 32;

/// Length of an encoded token value in characters.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// An opaque bearer token value.
///
/// Backed by [`SecretString`] so the value is zeroed on drop and redacted in
/// `Debug` output. Comparisons against candidate strings go through
/// [`TokenValue::matches`], which is constant-time.
#[derive(Clone)]
pub struct TokenValue(SecretString);

impl TokenValue {
    /// Generate a fresh token: 32 bytes from a cryptographically secure RNG,
    /// encoded as 64 lowercase hex characters.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(SecretString::from(hex::encode(bytes)))
    }

    /// Wrap an existing token value (e.g. one read back from storage).
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Expose the raw value. Needed at serialization and hook boundaries;
    /// avoid holding the reference.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Constant-time comparison against a candidate string.
    ///
    /// Token values have a fixed public length, so the initial length check
    /// leaks nothing useful.
    pub fn matches(&self, candidate: &str) -> bool {
        let own = self.0.expose_secret().as_bytes();
        let other = candidate.as_bytes();
        if own.len() != other.len() {
            return false;
        }
        own.ct_eq(other).into()
    }
}

impl std::fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenValue[REDACTED]")
    }
}
