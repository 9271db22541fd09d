//! Per-user permission overrides from `user_permissions`.

use signage_core::PermissionOverride;
use sqlx::postgres::PgPool;

use crate::{AppError, DbError, UserPermission};

#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Override rows for a user, ordered by permission name.
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<UserPermission>, AppError> {
        sqlx::query_as::<_, UserPermission>(
            "SELECT user_id, permission, granted, created_at
               FROM user_permissions
              WHERE user_id = $1
              ORDER BY permission",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Overrides in the shape used to resolve effective permissions.
    pub async fn overrides(&self, user_id: i32) -> Result<Vec<PermissionOverride>, AppError> {
        Ok(self
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(|row| PermissionOverride {
                permission: row.permission,
                granted: row.granted,
            })
            .collect())
    }

    /// Grant or revoke a permission for a user, replacing any prior override.
    pub async fn set_override(
        &self,
        user_id: i32,
        permission: &str,
        granted: bool,
    ) -> Result<UserPermission, AppError> {
        sqlx::query_as::<_, UserPermission>(
            "INSERT INTO user_permissions (user_id, permission, granted)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, permission)
             DO UPDATE SET granted = EXCLUDED.granted, created_at = NOW()
             RETURNING user_id, permission, granted, created_at",
        )
        .bind(user_id)
        .bind(permission)
        .bind(granted)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Remove an override so the role default applies again.
    pub async fn clear_override(&self, user_id: i32, permission: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM user_permissions WHERE user_id = $1 AND permission = $2",
        )
        .bind(user_id)
        .bind(permission)
        .execute(&self.pool)
        .await
        .map_err(DbError)?;
        Ok(result.rows_affected() > 0)
    }
}
