//! PostgreSQL-backed identity store
//!
//! Only available with the `identity-postgres` feature. Expects a table with
//! the columns referenced below; the admin backend owns the migration.

#![cfg(feature = "identity-postgres")]

use crate::core::{IdentityStoreError, TokenValue};
use crate::identity::{IdentityRecord, IdentityStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

/// Configuration for the PostgreSQL identity store.
#[derive(Debug, Clone)]
pub struct PostgresIdentityConfig {
    /// Table name
    pub table_name: String,
    /// Schema name
    pub schema: String,
}

impl Default for PostgresIdentityConfig {
    fn default() -> Self {
        Self {
            table_name: "identities".to_string(),
            schema: "public".to_string(),
        }
    }
}

/// PostgreSQL implementation of [`IdentityStore`].
///
/// Token updates are single `UPDATE` statements, so per-identity atomicity
/// comes from the database.
pub struct PostgresIdentityStore {
    pool: PgPool,
    config: PostgresIdentityConfig,
}

impl PostgresIdentityStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool, config: PostgresIdentityConfig) -> Self {
        Self { pool, config }
    }

    /// Create with default table naming.
    pub fn with_pool(pool: PgPool) -> Self {
        Self::new(pool, PostgresIdentityConfig::default())
    }

    fn table(&self) -> String {
        format!("{}.{}", self.config.schema, self.config.table_name)
    }
}

fn map_sqlx(operation: &str, err: sqlx::Error) -> IdentityStoreError {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            IdentityStoreError::Unavailable(format!("{operation}: {err}"))
        }
        other => IdentityStoreError::Query(format!("{operation}: {other}")),
    }
}

fn row_to_record(row: &PgRow) -> Result<IdentityRecord, IdentityStoreError> {
    let read = |e: sqlx::Error| IdentityStoreError::Query(format!("row decode: {e}"));
    Ok(IdentityRecord {
        email: row.try_get("email").map_err(read)?,
        username: row.try_get("username").map_err(read)?,
        is_admin: row.try_get("is_admin").map_err(read)?,
        is_active: row.try_get("is_active").map_err(read)?,
        current_token: row
            .try_get::<Option<String>, _>("current_token")
            .map_err(read)?
            .map(TokenValue::from_string),
        token_expires_at: row.try_get("token_expires_at").map_err(read)?,
        last_login_at: row.try_get("last_login_at").map_err(read)?,
    })
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn insert(&self, record: IdentityRecord) -> Result<bool, IdentityStoreError> {
        let query = format!(
            "INSERT INTO {} (email, username, is_admin, is_active) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (email) DO NOTHING",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(&record.email)
            .bind(&record.username)
            .bind(record.is_admin)
            .bind(record.is_active)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("insert", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, email: &str) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        let query = format!(
            "SELECT email, username, is_admin, is_active, current_token, \
             token_expires_at, last_login_at FROM {} WHERE email = $1",
            self.table()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("get", e))?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn set_token(
        &self,
        email: &str,
        token: &TokenValue,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, IdentityStoreError> {
        let query = format!(
            "UPDATE {} SET current_token = $1, token_expires_at = $2 WHERE email = $3",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(token.expose())
            .bind(expires_at)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("set_token", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_token(&self, email: &str) -> Result<bool, IdentityStoreError> {
        let query = format!(
            "UPDATE {} SET current_token = NULL, token_expires_at = NULL WHERE email = $1",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("clear_token", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_token_if(&self, email: &str, token: &str) -> Result<bool, IdentityStoreError> {
        let query = format!(
            "UPDATE {} SET current_token = NULL, token_expires_at = NULL \
             WHERE email = $1 AND current_token = $2",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(email)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("clear_token_if", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(
        &self,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<(), IdentityStoreError> {
        let query = format!(
            "UPDATE {} SET last_login_at = $1 WHERE email = $2",
            self.table()
        );
        sqlx::query(&query)
            .bind(at)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("touch_last_login", e))?;
        Ok(())
    }

    async fn set_active(&self, email: &str, active: bool) -> Result<bool, IdentityStoreError> {
        let query = if active {
            format!("UPDATE {} SET is_active = TRUE WHERE email = $1", self.table())
        } else {
            format!(
                "UPDATE {} SET is_active = FALSE, current_token = NULL, \
                 token_expires_at = NULL WHERE email = $1",
                self.table()
            )
        };
        let result = sqlx::query(&query)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("set_active", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<IdentityRecord>, IdentityStoreError> {
        let query = format!(
            "SELECT email, username, is_admin, is_active, current_token, \
             token_expires_at, last_login_at FROM {} WHERE is_active ORDER BY email",
            self.table()
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("list_active", e))?;
        rows.iter().map(row_to_record).collect()
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, IdentityStoreError> {
        let query = format!(
            "UPDATE {} SET current_token = NULL, token_expires_at = NULL \
             WHERE token_expires_at IS NOT NULL AND token_expires_at <= $1",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("purge_expired_tokens", e))?;
        Ok(result.rows_affected())
    }
}
