//! Key-value settings from `settings`.

use sqlx::postgres::PgPool;

use crate::{AppError, DbError, Setting, UpsertSettingParams};

const SETTING_COLUMNS: &str = "key, value, type, category, description, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SettingRepository {
    pool: PgPool,
}

impl SettingRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All settings, optionally in one category, ordered by key.
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Setting>, AppError> {
        let sql = format!(
            "SELECT {SETTING_COLUMNS} FROM settings
              WHERE ($1::text IS NULL OR category = $1)
              ORDER BY key"
        );
        sqlx::query_as::<_, Setting>(&sql)
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn get(&self, key: &str) -> Result<Setting, AppError> {
        let sql = format!("SELECT {SETTING_COLUMNS} FROM settings WHERE key = $1");
        sqlx::query_as::<_, Setting>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Setting", key))
    }

    pub async fn upsert(&self, params: UpsertSettingParams<'_>) -> Result<Setting, AppError> {
        Self::upsert_with(&self.pool, params).await
    }

    /// Upsert several settings atomically, returning the number written.
    pub async fn upsert_many(&self, params: &[UpsertSettingParams<'_>]) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await.map_err(DbError)?;
        for item in params {
            Self::upsert_with(&mut *tx, *item).await?;
        }
        tx.commit().await.map_err(DbError)?;
        Ok(params.len())
    }

    async fn upsert_with<'e, E>(
        executor: E,
        params: UpsertSettingParams<'_>,
    ) -> Result<Setting, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = format!(
            "INSERT INTO settings (key, value, type, category, description)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (key) DO UPDATE SET
                value       = EXCLUDED.value,
                type        = EXCLUDED.type,
                category    = EXCLUDED.category,
                description = COALESCE(EXCLUDED.description, settings.description),
                updated_at  = NOW()
             RETURNING {SETTING_COLUMNS}"
        );
        sqlx::query_as::<_, Setting>(&sql)
            .bind(params.key)
            .bind(params.value)
            .bind(params.setting_type.as_str())
            .bind(params.category)
            .bind(params.description)
            .fetch_one(executor)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Setting", key));
        }
        Ok(())
    }
}
