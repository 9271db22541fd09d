//! User repository for `users` operations.

use sqlx::postgres::PgPool;

use crate::{
    AppError, CreateUserParams, DbError, SsoProvider, UpdateUserParams, User, UserListParams,
};

const USER_COLUMNS: &str = "id, email, password, first_name, last_name, role, is_active, \
     organization_id, azure_ad_id, sso_provider, last_login, created_at, updated_at";

/// Shared filter for `list` and its count query.
const USER_LIST_FILTER: &str = "
    WHERE (NOT $1 OR organization_id IS NOT DISTINCT FROM $2)
      AND ($3 OR role <> 'super_admin')
      AND ($4::text IS NULL
           OR email ILIKE '%' || $4 || '%'
           OR first_name ILIKE '%' || $4 || '%'
           OR last_name ILIKE '%' || $4 || '%')
      AND ($5::text IS NULL OR role = $5)
      AND ($6::bool IS NULL OR is_active = $6)";

/// User repository for `users` operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<User, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    /// Lookup by canonical (lowercased) email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn find_by_azure_ad_id(&self, azure_ad_id: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE azure_ad_id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(azure_ad_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    /// Whether another user already owns `email`.
    pub async fn email_taken(&self, email: &str, except_id: Option<i32>) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM users
                 WHERE LOWER(email) = LOWER($1)
                   AND ($2::int IS NULL OR id <> $2)
             )",
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Filtered page of users plus the total number of matches.
    pub async fn list(&self, params: UserListParams<'_>) -> Result<(Vec<User>, i64), AppError> {
        let (restricted, org) = params.scope.as_params();
        let role = params.role.map(|r| r.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM users {USER_LIST_FILTER}"
        ))
        .bind(restricted)
        .bind(org)
        .bind(params.include_super_admins)
        .bind(params.search)
        .bind(role)
        .bind(params.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError)?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users {USER_LIST_FILTER}
              ORDER BY created_at DESC, id DESC
              LIMIT $7 OFFSET $8"
        ))
        .bind(restricted)
        .bind(org)
        .bind(params.include_super_admins)
        .bind(params.search)
        .bind(role)
        .bind(params.is_active)
        .bind(i64::from(params.page.limit))
        .bind(params.page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError)?;

        Ok((users, total))
    }

    pub async fn create(&self, params: CreateUserParams<'_>) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (
                email, password, first_name, last_name, role,
                organization_id, azure_ad_id, sso_provider
             )
             VALUES (LOWER($1), $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(params.email)
            .bind(params.password_hash)
            .bind(params.first_name)
            .bind(params.last_name)
            .bind(params.role.as_str())
            .bind(params.organization_id)
            .bind(params.azure_ad_id)
            .bind(params.sso_provider.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    /// Partial update; `None` fields keep their value.
    pub async fn update(&self, id: i32, params: UpdateUserParams<'_>) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET
                email           = COALESCE(LOWER($2), email),
                first_name      = COALESCE($3, first_name),
                last_name       = COALESCE($4, last_name),
                role            = COALESCE($5, role),
                is_active       = COALESCE($6, is_active),
                organization_id = COALESCE($7, organization_id),
                updated_at      = NOW()
              WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(params.email)
            .bind(params.first_name)
            .bind(params.last_name)
            .bind(params.role.map(|r| r.as_str()))
            .bind(params.is_active)
            .bind(params.organization_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    pub async fn set_password(&self, id: i32, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn touch_last_login(&self, id: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;
        Ok(())
    }

    /// Attach a federated identity to an existing account and refresh its
    /// profile. The role is left alone.
    pub async fn link_sso(
        &self,
        id: i32,
        provider: SsoProvider,
        azure_ad_id: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET
                sso_provider = $2,
                azure_ad_id  = COALESCE($3, azure_ad_id),
                first_name   = COALESCE($4, first_name),
                last_name    = COALESCE($5, last_name),
                updated_at   = NOW()
              WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(provider.as_str())
            .bind(azure_ad_id)
            .bind(first_name)
            .bind(last_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    /// Flip `is_active`, returning the updated user.
    pub async fn toggle_active(&self, id: i32) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET is_active = NOT is_active, updated_at = NOW()
              WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User", id));
        }
        Ok(())
    }
}
