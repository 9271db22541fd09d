//! Post repository for `posts` and `post_displays` operations.
//!
//! Reads return [`Post`] with its display assignments aggregated into
//! `display_ids` and a summary of the joined category and media rows.

use signage_core::OrgScope;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;

use crate::{
    AppError, CreatePostParams, DbError, Post, PostListParams, PostSort, UpdatePostParams,
};

const POST_SELECT: &str = "
    SELECT p.id, p.title, p.content, p.content_type, p.media_id, p.category_id,
           p.organization_id, p.created_by, p.start_date, p.end_date, p.duration,
           p.priority, p.is_active, p.show_title, p.display_mode, p.view_count,
           p.background_music_url, p.background_music_volume, p.blend_effect,
           p.sound_enabled, p.created_at, p.updated_at,
           ARRAY(SELECT pd.display_id FROM post_displays pd
                  WHERE pd.post_id = p.id ORDER BY pd.display_id) AS display_ids,
           c.name AS category_name, c.color AS category_color,
           m.url AS media_url, m.mime_type AS media_mime_type
      FROM posts p
      LEFT JOIN categories c ON c.id = p.category_id
      LEFT JOIN media m ON m.id = p.media_id";

const POST_LIST_FILTER: &str = "
    WHERE (NOT $1 OR p.organization_id IS NOT DISTINCT FROM $2)
      AND ($3::int IS NULL OR p.category_id = $3)
      AND ($4::bool IS NULL OR p.is_active = $4)
      AND ($5::text IS NULL
           OR p.title ILIKE '%' || $5 || '%'
           OR p.content ILIKE '%' || $5 || '%')";

/// Schedule window applied by public queries.
const ACTIVE_WINDOW: &str = "p.is_active
      AND (p.start_date IS NULL OR p.start_date <= NOW())
      AND (p.end_date IS NULL OR p.end_date >= NOW())";

/// Post repository for `posts` operations.
#[derive(Debug, Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, sorted page of posts plus the total number of matches.
    pub async fn list(&self, params: PostListParams<'_>) -> Result<(Vec<Post>, i64), AppError> {
        let (restricted, org) = params.scope.as_params();
        let direction = params.order.as_sql();
        let order_by = match params.sort {
            PostSort::Priority => format!("p.priority {direction}, p.created_at DESC"),
            PostSort::CreatedAt => format!("p.created_at {direction}, p.priority DESC"),
        };

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM posts p {POST_LIST_FILTER}"
        ))
        .bind(restricted)
        .bind(org)
        .bind(params.category_id)
        .bind(params.is_active)
        .bind(params.search)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError)?;

        let posts = sqlx::query_as::<_, Post>(&format!(
            "{POST_SELECT} {POST_LIST_FILTER}
              ORDER BY {order_by}, p.id DESC
              LIMIT $6 OFFSET $7"
        ))
        .bind(restricted)
        .bind(org)
        .bind(params.category_id)
        .bind(params.is_active)
        .bind(params.search)
        .bind(i64::from(params.page.limit))
        .bind(params.page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError)?;

        Ok((posts, total))
    }

    pub async fn get(&self, id: i32) -> Result<Post, AppError> {
        Self::fetch(&self.pool, id).await
    }

    async fn fetch<'e, E>(executor: E, id: i32) -> Result<Post, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Post", id))
    }

    /// Insert a post and its display assignments in one transaction.
    pub async fn create(&self, params: CreatePostParams<'_>) -> Result<Post, AppError> {
        let mut tx = self.pool.begin().await.map_err(DbError)?;

        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO posts (
                title, content, content_type, media_id, category_id, organization_id,
                created_by, start_date, end_date, duration, priority, is_active,
                show_title, display_mode, background_music_url, background_music_volume,
                blend_effect, sound_enabled
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             RETURNING id",
        )
        .bind(params.title)
        .bind(params.content)
        .bind(params.content_type.as_str())
        .bind(params.media_id)
        .bind(params.category_id)
        .bind(params.organization_id)
        .bind(params.created_by)
        .bind(params.start_date)
        .bind(params.end_date)
        .bind(params.duration)
        .bind(params.priority)
        .bind(params.is_active)
        .bind(params.show_title)
        .bind(params.display_mode.as_str())
        .bind(params.background_music_url)
        .bind(params.background_music_volume)
        .bind(params.blend_effect)
        .bind(params.sound_enabled)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError)?;

        replace_assignments(&mut tx, id, params.display_ids).await?;
        let post = Self::fetch(&mut *tx, id).await?;
        tx.commit().await.map_err(DbError)?;
        Ok(post)
    }

    /// Write the merged field set; replaces assignments when `display_ids` is set.
    pub async fn update(&self, id: i32, params: UpdatePostParams<'_>) -> Result<Post, AppError> {
        let mut tx = self.pool.begin().await.map_err(DbError)?;

        let result = sqlx::query(
            "UPDATE posts SET
                title = $2, content = $3, content_type = $4, media_id = $5,
                category_id = $6, start_date = $7, end_date = $8, duration = $9,
                priority = $10, is_active = $11, show_title = $12, display_mode = $13,
                background_music_url = $14, background_music_volume = $15,
                blend_effect = $16, sound_enabled = $17, updated_at = NOW()
              WHERE id = $1",
        )
        .bind(id)
        .bind(params.title)
        .bind(params.content)
        .bind(params.content_type.as_str())
        .bind(params.media_id)
        .bind(params.category_id)
        .bind(params.start_date)
        .bind(params.end_date)
        .bind(params.duration)
        .bind(params.priority)
        .bind(params.is_active)
        .bind(params.show_title)
        .bind(params.display_mode.as_str())
        .bind(params.background_music_url)
        .bind(params.background_music_volume)
        .bind(params.blend_effect)
        .bind(params.sound_enabled)
        .execute(&mut *tx)
        .await
        .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Post", id));
        }

        if let Some(display_ids) = params.display_ids {
            replace_assignments(&mut tx, id, display_ids).await?;
        }

        let post = Self::fetch(&mut *tx, id).await?;
        tx.commit().await.map_err(DbError)?;
        Ok(post)
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Post", id));
        }
        Ok(())
    }

    /// Delete every post in `scope`, returning the number removed.
    pub async fn delete_all(&self, scope: OrgScope) -> Result<u64, AppError> {
        let (restricted, org) = scope.as_params();
        let result = sqlx::query(
            "DELETE FROM posts WHERE (NOT $1 OR organization_id IS NOT DISTINCT FROM $2)",
        )
        .bind(restricted)
        .bind(org)
        .execute(&self.pool)
        .await
        .map_err(DbError)?;
        Ok(result.rows_affected())
    }

    /// Apply `(id, priority)` pairs in one transaction. Ids outside `scope` are skipped.
    pub async fn set_priorities(
        &self,
        scope: OrgScope,
        priorities: &[(i32, i32)],
    ) -> Result<u64, AppError> {
        let (restricted, org) = scope.as_params();
        let mut tx = self.pool.begin().await.map_err(DbError)?;
        let mut updated = 0;

        for (id, priority) in priorities {
            let result = sqlx::query(
                "UPDATE posts SET priority = $2, updated_at = NOW()
                  WHERE id = $1
                    AND (NOT $3 OR organization_id IS NOT DISTINCT FROM $4)",
            )
            .bind(id)
            .bind(priority)
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

    pub async fn increment_view_count(&self, id: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;
        Ok(())
    }

    /// Every post that targets a display: mode `all` within the display's
    /// organization (or unscoped), or explicitly assigned to it.
    ///
    /// Schedule filtering happens in the caller so it can be evaluated
    /// against a single clock.
    pub async fn candidates_for_display(
        &self,
        display_id: i32,
        organization_id: Option<i32>,
    ) -> Result<Vec<Post>, AppError> {
        sqlx::query_as::<_, Post>(&format!(
            "{POST_SELECT}
              WHERE (p.display_mode = 'all'
                     AND (p.organization_id IS NULL
                          OR p.organization_id IS NOT DISTINCT FROM $2))
                 OR EXISTS (SELECT 1 FROM post_displays pd
                             WHERE pd.post_id = p.id AND pd.display_id = $1)
              ORDER BY p.priority DESC, p.created_at DESC"
        ))
        .bind(display_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Posts currently inside their schedule window for the public API.
    pub async fn list_active(
        &self,
        organization_id: Option<i32>,
        category_id: Option<i32>,
    ) -> Result<Vec<Post>, AppError> {
        sqlx::query_as::<_, Post>(&format!(
            "{POST_SELECT}
              WHERE {ACTIVE_WINDOW}
                AND ($1::int IS NULL OR p.organization_id = $1)
                AND ($2::int IS NULL OR p.category_id = $2)
              ORDER BY p.priority DESC, p.created_at DESC"
        ))
        .bind(organization_id)
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }
}

/// Replace the assignment set of a post.
async fn replace_assignments(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i32,
    display_ids: &[i32],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM post_displays WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut **tx)
        .await
        .map_err(DbError)?;

    if !display_ids.is_empty() {
        sqlx::query(
            "INSERT INTO post_displays (post_id, display_id)
             SELECT $1, UNNEST($2::int[])
             ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(display_ids)
        .execute(&mut **tx)
        .await
        .map_err(DbError)?;
    }
    Ok(())
}
