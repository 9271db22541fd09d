//! Refresh-token sessions from `sessions`.
//!
//! Only SHA-256 hashes of refresh tokens are stored. Refresh rotates the
//! session: the old row is consumed and a new one created.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;

use crate::{AppError, DbError};

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i32,
        refresh_token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO sessions (user_id, refresh_token, expires_at)
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(refresh_token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(DbError)?;
        Ok(())
    }

    /// Atomically consume an unexpired session and return its owner.
    pub async fn consume(&self, refresh_token_hash: &[u8]) -> Result<i32, AppError> {
        sqlx::query_scalar::<_, i32>(
            "DELETE FROM sessions
              WHERE refresh_token = $1 AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(refresh_token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError)?
        .ok_or_else(|| AppError::token_invalid("refresh token"))
    }

    /// Revoke a single session by token hash.
    pub async fn revoke(&self, refresh_token_hash: &[u8]) -> Result<Option<i32>, AppError> {
        sqlx::query_scalar::<_, i32>(
            "DELETE FROM sessions WHERE refresh_token = $1 RETURNING user_id",
        )
        .bind(refresh_token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Revoke every session of a user (password change, deactivation).
    pub async fn revoke_all_for_user(&self, user_id: i32) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;
        Ok(result.rows_affected())
    }

    /// Delete sessions whose refresh token has expired.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query(PURGE_EXPIRED)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;
        Ok(result.rows_affected())
    }
}

const PURGE_EXPIRED: &str = "DELETE FROM sessions WHERE expires_at <= NOW()";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_matches_the_refresh_lookup_boundary() {
        // consume() accepts `expires_at > NOW()`; purge removes exactly the rest.
        assert!(PURGE_EXPIRED.ends_with("WHERE expires_at <= NOW()"));
        assert!(PURGE_EXPIRED.starts_with("DELETE FROM sessions"));
    }
}
