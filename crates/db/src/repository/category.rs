//! Category repository for `categories` operations.

use signage_core::OrgScope;
use sqlx::postgres::PgPool;

use crate::{AppError, Category, CreateCategoryParams, DbError, UpdateCategoryParams};

const CATEGORY_COLUMNS: &str =
    "id, name, color, icon, sort_order, is_active, organization_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Categories in scope, ordered by `sort_order` then name.
    pub async fn list(&self, scope: OrgScope) -> Result<Vec<Category>, AppError> {
        let (restricted, org) = scope.as_params();
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
              WHERE (NOT $1 OR organization_id IS NOT DISTINCT FROM $2)
              ORDER BY sort_order, name"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(restricted)
            .bind(org)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    /// Active categories for the public API, optionally limited to one org.
    pub async fn list_active(
        &self,
        organization_id: Option<i32>,
    ) -> Result<Vec<Category>, AppError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
              WHERE is_active AND ($1::int IS NULL OR organization_id = $1)
              ORDER BY name"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn get(&self, id: i32) -> Result<Category, AppError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Category", id))
    }

    /// Whether `name` is used by another category of the same organization.
    pub async fn name_exists(
        &self,
        name: &str,
        organization_id: Option<i32>,
        except_id: Option<i32>,
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM categories
                 WHERE name = $1
                   AND organization_id IS NOT DISTINCT FROM $2
                   AND ($3::int IS NULL OR id <> $3)
             )",
        )
        .bind(name)
        .bind(organization_id)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    pub async fn create(&self, params: CreateCategoryParams<'_>) -> Result<Category, AppError> {
        let sql = format!(
            "INSERT INTO categories (name, color, icon, sort_order, organization_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(params.name)
            .bind(params.color)
            .bind(params.icon)
            .bind(params.sort_order)
            .bind(params.organization_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn update(
        &self,
        id: i32,
        params: UpdateCategoryParams<'_>,
    ) -> Result<Category, AppError> {
        let sql = format!(
            "UPDATE categories SET
                name       = COALESCE($2, name),
                color      = COALESCE($3, color),
                icon       = COALESCE($4, icon),
                sort_order = COALESCE($5, sort_order),
                is_active  = COALESCE($6, is_active),
                updated_at = NOW()
              WHERE id = $1
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(params.name)
            .bind(params.color)
            .bind(params.icon)
            .bind(params.sort_order)
            .bind(params.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Category", id))
    }

    /// Number of posts referencing the category.
    pub async fn count_posts(&self, id: i32) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE category_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Category", id));
        }
        Ok(())
    }

    /// Set `sort_order` to each id's position. Ids outside `scope` are skipped.
    pub async fn reorder(&self, scope: OrgScope, ordered_ids: &[i32]) -> Result<u64, AppError> {
        let (restricted, org) = scope.as_params();
        let mut tx = self.pool.begin().await.map_err(DbError)?;
        let mut updated = 0;

        for (index, id) in ordered_ids.iter().enumerate() {
            let position = i32::try_from(index)
                .map_err(|_| AppError::invalid("Too many categories to reorder"))?;
            let result = sqlx::query(
                "UPDATE categories SET sort_order = $2, updated_at = NOW()
                  WHERE id = $1
                    AND (NOT $3 OR organization_id IS NOT DISTINCT FROM $4)",
            )
            .bind(id)
            .bind(position)
            .bind(restricted)
            .bind(org)
            .execute(&mut *tx)
            .await
            .map_err(DbError)?;
            updated += result.rows_affected();
        }

        tx.commit().await.map_err(DbError)?;
        Ok(updated)
    }
}
