//! Display repository for `displays` operations.

use signage_core::OrgScope;
use sqlx::postgres::PgPool;

use crate::{
    AppError, CreateDisplayParams, DbError, Display, DisplayWithStats, LicencePool, LicenceSeat,
    UpdateDisplayParams,
};

const DISPLAY_COLUMNS: &str = "id, name, identifier, description, is_active, show_transit_data, \
     show_traffic_data, organization_id, created_at, updated_at";

/// Display repository for `displays` operations.
#[derive(Debug, Clone)]
pub struct DisplayRepository {
    pool: PgPool,
}

impl DisplayRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Displays in scope with assignment counters, ordered by name.
    pub async fn list_with_stats(
        &self,
        scope: OrgScope,
    ) -> Result<Vec<DisplayWithStats>, AppError> {
        let (restricted, org) = scope.as_params();
        sqlx::query_as::<_, DisplayWithStats>(
            "SELECT d.id, d.name, d.identifier, d.description, d.is_active,
                    d.show_transit_data, d.show_traffic_data, d.organization_id,
                    d.created_at, d.updated_at,
                    (SELECT COUNT(*) FROM post_displays pd WHERE pd.display_id = d.id)
                        AS assigned_posts,
                    (SELECT COUNT(*) FROM device_registrations r
                      WHERE r.display_id = d.id AND r.status = 'authorized')
                        AS authorized_devices
               FROM displays d
              WHERE (NOT $1 OR d.organization_id IS NOT DISTINCT FROM $2)
              ORDER BY d.name",
        )
        .bind(restricted)
        .bind(org)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Active displays for the public listing.
    pub async fn list_active(&self) -> Result<Vec<Display>, AppError> {
        let sql = format!(
            "SELECT {DISPLAY_COLUMNS} FROM displays WHERE is_active ORDER BY name"
        );
        sqlx::query_as::<_, Display>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn get(&self, id: i32) -> Result<Display, AppError> {
        let sql = format!("SELECT {DISPLAY_COLUMNS} FROM displays WHERE id = $1");
        sqlx::query_as::<_, Display>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Display", id))
    }

    pub async fn get_by_identifier(&self, identifier: &str) -> Result<Display, AppError> {
        let sql = format!("SELECT {DISPLAY_COLUMNS} FROM displays WHERE identifier = $1");
        sqlx::query_as::<_, Display>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Display", identifier))
    }

    /// Whether another display already uses `identifier`.
    pub async fn identifier_exists(
        &self,
        identifier: &str,
        except_id: Option<i32>,
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM displays
                 WHERE identifier = $1 AND ($2::int IS NULL OR id <> $2)
             )",
        )
        .bind(identifier)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Whether every id in `ids` names a display inside `scope`.
    pub async fn all_in_scope(&self, scope: OrgScope, ids: &[i32]) -> Result<bool, AppError> {
        if ids.is_empty() {
            return Ok(true);
        }
        let (restricted, org) = scope.as_params();
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT id) FROM displays
              WHERE id = ANY($1)
                AND (NOT $2 OR organization_id IS NOT DISTINCT FROM $3)",
        )
        .bind(ids)
        .bind(restricted)
        .bind(org)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError)?;

        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        Ok(usize::try_from(found).is_ok_and(|n| n == unique.len()))
    }

    /// Insert a display once the licence pool of `seat` has room.
    pub async fn create(
        &self,
        params: CreateDisplayParams<'_>,
        seat: LicenceSeat,
    ) -> Result<Display, AppError> {
        let mut tx = self.pool.begin().await.map_err(DbError)?;
        LicencePool::Displays.reserve(&mut tx, seat).await?;

        let sql = format!(
            "INSERT INTO displays (
                name, identifier, description, is_active,
                show_transit_data, show_traffic_data, organization_id
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {DISPLAY_COLUMNS}"
        );
        let display = sqlx::query_as::<_, Display>(&sql)
            .bind(params.name)
            .bind(params.identifier)
            .bind(params.description)
            .bind(params.is_active)
            .bind(params.show_transit_data)
            .bind(params.show_traffic_data)
            .bind(params.organization_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError)?;

        tx.commit().await.map_err(DbError)?;
        Ok(display)
    }

    pub async fn update(
        &self,
        id: i32,
        params: UpdateDisplayParams<'_>,
    ) -> Result<Display, AppError> {
        let sql = format!(
            "UPDATE displays SET
                name              = COALESCE($2, name),
                identifier        = COALESCE($3, identifier),
                description       = COALESCE($4, description),
                is_active         = COALESCE($5, is_active),
                show_transit_data = COALESCE($6, show_transit_data),
                show_traffic_data = COALESCE($7, show_traffic_data),
                updated_at        = NOW()
              WHERE id = $1
             RETURNING {DISPLAY_COLUMNS}"
        );
        sqlx::query_as::<_, Display>(&sql)
            .bind(id)
            .bind(params.name)
            .bind(params.identifier)
            .bind(params.description)
            .bind(params.is_active)
            .bind(params.show_transit_data)
            .bind(params.show_traffic_data)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Display", id))
    }

    /// Delete a display, returning how many post assignments went with it.
    pub async fn delete(&self, id: i32) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await.map_err(DbError)?;

        let assignments =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post_displays WHERE display_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(DbError)?;

        let result = sqlx::query("DELETE FROM displays WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Display", id));
        }

        tx.commit().await.map_err(DbError)?;
        Ok(assignments)
    }
}
