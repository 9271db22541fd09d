//! Media metadata repository for `media` operations.

use signage_core::OrgScope;
use sqlx::postgres::PgPool;

use crate::{AppError, CreateMediaParams, DbError, Media, Page};

const MEDIA_COLUMNS: &str = "id, filename, original_name, mime_type, size, url, thumbnail_url, \
     width, height, uploaded_by, organization_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, params: CreateMediaParams<'_>) -> Result<Media, AppError> {
        let sql = format!(
            "INSERT INTO media (filename, original_name, mime_type, size, url, uploaded_by, organization_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {MEDIA_COLUMNS}"
        );
        sqlx::query_as::<_, Media>(&sql)
            .bind(params.filename)
            .bind(params.original_name)
            .bind(params.mime_type)
            .bind(params.size)
            .bind(params.url)
            .bind(params.uploaded_by)
            .bind(params.organization_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    /// Newest-first page of media in scope, optionally by MIME prefix.
    pub async fn list(
        &self,
        scope: OrgScope,
        mime_prefix: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Media>, i64), AppError> {
        let (restricted, org) = scope.as_params();
        let filter = "WHERE (NOT $1 OR organization_id IS NOT DISTINCT FROM $2)
                        AND ($3::text IS NULL OR mime_type LIKE $3 || '%')";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM media {filter}"))
            .bind(restricted)
            .bind(org)
            .bind(mime_prefix)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError)?;

        let items = sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media {filter}
              ORDER BY created_at DESC, id DESC
              LIMIT $4 OFFSET $5"
        ))
        .bind(restricted)
        .bind(org)
        .bind(mime_prefix)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError)?;

        Ok((items, total))
    }

    pub async fn get(&self, id: i32) -> Result<Media, AppError> {
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1");
        sqlx::query_as::<_, Media>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Media", id))
    }

    /// Number of posts using this media item.
    pub async fn count_referencing_posts(&self, id: i32) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE media_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Media", id));
        }
        Ok(())
    }
}
