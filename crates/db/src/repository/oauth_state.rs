//! PKCE state storage for the Azure AD login flow.

use std::time::Duration;

use sqlx::postgres::PgPool;

use crate::{AppError, ConsumedOAuthState, DbError};

/// OAuth state repository for `oauth_states` operations.
#[derive(Debug, Clone)]
pub struct OAuthStateRepository {
    pool: PgPool,
}

impl OAuthStateRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a state with its PKCE verifier for `ttl`.
    pub async fn create(
        &self,
        state: &str,
        code_verifier: &str,
        redirect_to: Option<&str>,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| AppError::Internal(format!("Invalid OAuth state TTL: {e}")))?;

        sqlx::query(
            "INSERT INTO oauth_states (state, code_verifier, redirect_to, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(state)
        .bind(code_verifier)
        .bind(redirect_to)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(DbError)?;
        Ok(())
    }

    /// Delete and return an unexpired state. A state can be used once.
    pub async fn consume(&self, state: &str) -> Result<Option<ConsumedOAuthState>, AppError> {
        sqlx::query_as::<_, ConsumedOAuthState>(
            "DELETE FROM oauth_states
              WHERE state = $1 AND expires_at > NOW()
             RETURNING code_verifier, redirect_to",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Delete expired states, returning the number removed.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(DbError)?;
        Ok(result.rows_affected())
    }
}
