//! Persisted token record and its line-oriented text codec
//!
//! The on-disk/on-object format is three `key=value` lines:
//!
//! ```text
//! token=<64 lowercase hex chars>
//! created_at=<ISO-8601 timestamp>
//! expires_at=<ISO-8601 timestamp>
//! ```
//!
//! Unknown keys are ignored so newer writers stay readable by older readers.

use crate::core::error::RecordError;
use crate::core::token::TokenValue;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One issued token with its validity window.
///
/// Invariant: `expires_at > created_at`. Exactly one record is current per
/// owner; rotation replaces it wholesale.
#[derive(Clone, Debug)]
pub struct TokenRecord {
    /// The token value
    pub value: TokenValue,
    /// Issuance time
    pub created_at: DateTime<Utc>,
    /// End of the validity window
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Build a record from its parts.
    pub fn new(value: TokenValue, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            created_at,
            expires_at,
        }
    }

    /// Issue a fresh record valid for `ttl` from now.
    pub fn issue(ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self {
            value: TokenValue::generate(),
            created_at: now,
            expires_at,
        }
    }

    /// Whether the validity window has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Remaining validity, `None` once expired.
    pub fn ttl(&self) -> Option<Duration> {
        (self.expires_at - Utc::now()).to_std().ok()
    }

    /// Serialize to the line-oriented text format.
    pub fn to_text(&self) -> String {
        format!(
            "token={}\ncreated_at={}\nexpires_at={}\n",
            self.value.expose(),
            self.created_at.to_rfc3339(),
            self.expires_at.to_rfc3339(),
        )
    }

    /// Parse the line-oriented text format.
    ///
    /// Fails if `token` or `created_at` is missing or a timestamp is
    /// unparseable. A missing `expires_at` yields a record that is already
    /// expired (`expires_at == created_at`), which forces reissuance on the
    /// next access rather than trusting a window we cannot see.
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let mut token = None;
        let mut created_at = None;
        let mut expires_at = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "token" => token = Some(value.trim().to_string()),
                "created_at" => created_at = Some(parse_timestamp("created_at", value.trim())?),
                "expires_at" => expires_at = Some(parse_timestamp("expires_at", value.trim())?),
                _ => {}
            }
        }

        let token = token.ok_or(RecordError::MissingField { field: "token" })?;
        let created_at = created_at.ok_or(RecordError::MissingField {
            field: "created_at",
        })?;
        let expires_at = expires_at.unwrap_or(created_at);

        Ok(Self {
            value: TokenValue::from_string(token),
            created_at,
            expires_at,
        })
    }
}

impl PartialEq for TokenRecord {
    fn eq(&self, other: &Self) -> bool {
        self.value.expose() == other.value.expose()
            && self.created_at == other.created_at
            && self.expires_at == other.expires_at
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, RecordError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RecordError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> TokenRecord {
        TokenRecord::issue(Duration::from_secs(3600))
    }

    #[test]
    fn test_round_trip() {
        let record = sample();
        let parsed = TokenRecord::parse(&record.to_text()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_parse_missing_token() {
        let text = "created_at=2026-01-01T00:00:00Z\nexpires_at=2026-01-02T00:00:00Z\n";
        assert_eq!(
            TokenRecord::parse(text).unwrap_err(),
            RecordError::MissingField { field: "token" }
        );
    }

    #[test]
    fn test_parse_missing_created_at() {
        let text = "token=abc123\nexpires_at=2026-01-02T00:00:00Z\n";
        assert_eq!(
            TokenRecord::parse(text).unwrap_err(),
            RecordError::MissingField {
                field: "created_at"
            }
        );
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let text = "token=abc123\ncreated_at=2026-01-01T00:00:00Z\nexpires_at=2026-01-02T00:00:00Z\nissuer=tessera\n";
        let record = TokenRecord::parse(text).unwrap();
        assert_eq!(record.value.expose(), "abc123");
    }

    #[test]
    fn test_parse_missing_expires_at_is_expired() {
        let text = "token=abc123\ncreated_at=2026-01-01T00:00:00Z\n";
        let record = TokenRecord::parse(text).unwrap();
        assert_eq!(record.expires_at, record.created_at);
        assert!(record.is_expired());
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        let text = "token=abc123\ncreated_at=yesterday\n";
        assert!(matches!(
            TokenRecord::parse(text).unwrap_err(),
            RecordError::InvalidTimestamp {
                field: "created_at",
                ..
            }
        ));
    }

    #[test]
    fn test_issue_window() {
        let record = sample();
        assert!(record.expires_at > record.created_at);
        assert!(!record.is_expired());
        assert!(record.ttl().is_some());
    }
}
