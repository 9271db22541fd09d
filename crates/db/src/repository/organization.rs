//! Organization repository for `organizations` operations.

use signage_core::OrgScope;
use sqlx::postgres::PgPool;

use crate::{AppError, CreateOrganizationParams, DbError, Organization, UpdateOrganizationParams};

const ORGANIZATION_COLUMNS: &str = "id, name, slug, logo_url, primary_color, is_active, \
     max_users, max_displays, created_at, updated_at";

/// Organization repository for `organizations` operations.
#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List organizations visible in `scope`, ordered by name.
    pub async fn list(&self, scope: OrgScope) -> Result<Vec<Organization>, AppError> {
        let (restricted, org) = scope.as_params();
        let sql = format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations
              WHERE (NOT $1 OR id IS NOT DISTINCT FROM $2)
              ORDER BY name"
        );
        sqlx::query_as::<_, Organization>(&sql)
            .bind(restricted)
            .bind(org)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn get(&self, id: i32) -> Result<Organization, AppError> {
        let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1");
        sqlx::query_as::<_, Organization>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Organization", id))
    }

    /// Active organization by slug, if any.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, AppError> {
        let sql = format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE slug = $1 AND is_active"
        );
        sqlx::query_as::<_, Organization>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    /// Oldest active organization, target for auto-provisioned SSO users.
    pub async fn first_active(&self) -> Result<Option<Organization>, AppError> {
        let sql = format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations
              WHERE is_active ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, Organization>(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn create(
        &self,
        params: CreateOrganizationParams<'_>,
    ) -> Result<Organization, AppError> {
        let sql = format!(
            "INSERT INTO organizations (name, slug, logo_url, primary_color, max_users, max_displays)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ORGANIZATION_COLUMNS}"
        );
        sqlx::query_as::<_, Organization>(&sql)
            .bind(params.name)
            .bind(params.slug)
            .bind(params.logo_url)
            .bind(params.primary_color)
            .bind(params.max_users)
            .bind(params.max_displays)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError(e).into())
    }

    pub async fn update(
        &self,
        id: i32,
        params: UpdateOrganizationParams<'_>,
    ) -> Result<Organization, AppError> {
        let sql = format!(
            "UPDATE organizations SET
                name          = COALESCE($2, name),
                logo_url      = COALESCE($3, logo_url),
                primary_color = COALESCE($4, primary_color),
                is_active     = COALESCE($5, is_active),
                max_users     = COALESCE($6, max_users),
                max_displays  = COALESCE($7, max_displays),
                updated_at    = NOW()
              WHERE id = $1
             RETURNING {ORGANIZATION_COLUMNS}"
        );
        sqlx::query_as::<_, Organization>(&sql)
            .bind(id)
            .bind(params.name)
            .bind(params.logo_url)
            .bind(params.primary_color)
            .bind(params.is_active)
            .bind(params.max_users)
            .bind(params.max_displays)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Organization", id))
    }
}
