//! Organizations: tenant records.

use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use serde::Deserialize;
use signage_core::validation::{require_non_empty, validate_color, validate_slug};
use signage_core::{AppError, AuthInfo, permissions as perm};
use signage_db::{CreateOrganizationParams, Organization, UpdateOrganizationParams};
use tracing::{info, instrument};

use super::permissions::{require_permission, require_super_admin};
use crate::core::{ApiResponse, JsonBody, PathParam, ServiceContext};

const DEFAULT_MAX_USERS: i32 = 10;
const DEFAULT_MAX_DISPLAYS: i32 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub max_users: Option<i32>,
    pub max_displays: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub is_active: Option<bool>,
    pub max_users: Option<i32>,
    pub max_displays: Option<i32>,
}

#[derive(Clone)]
pub struct OrganizationService {
    ctx: Arc<ServiceContext>,
}

impl OrganizationService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    pub async fn list(&self, auth: &AuthInfo) -> Result<Vec<Organization>, AppError> {
        require_permission(&self.ctx, auth, &[perm::ORGANIZATIONS_READ]).await?;
        self.ctx.db().organizations.list(auth.org_scope()).await
    }

    pub async fn get(&self, auth: &AuthInfo, id: i32) -> Result<Organization, AppError> {
        require_permission(&self.ctx, auth, &[perm::ORGANIZATIONS_READ]).await?;
        auth.require_org(Some(id), "organization")?;
        self.ctx.db().organizations.get(id).await
    }

    pub async fn create(
        &self,
        auth: &AuthInfo,
        req: CreateOrganizationRequest,
    ) -> Result<Organization, AppError> {
        require_super_admin(auth)?;
        require_non_empty("name", &req.name)?;
        require_non_empty("slug", &req.slug)?;
        validate_slug(&req.slug)?;
        if let Some(color) = req.primary_color.as_deref() {
            validate_color(color)?;
        }

        let org = self
            .ctx
            .db()
            .organizations
            .create(CreateOrganizationParams {
                name: req.name.trim(),
                slug: &req.slug,
                logo_url: req.logo_url.as_deref(),
                primary_color: req.primary_color.as_deref(),
                max_users: req.max_users.unwrap_or(DEFAULT_MAX_USERS),
                max_displays: req.max_displays.unwrap_or(DEFAULT_MAX_DISPLAYS),
            })
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::conflict("Organization", "slug"),
                other => other,
            })?;

        info!(
            organization_id = org.id,
            slug = %org.slug,
            by = auth.user_id,
            "Organization created"
        );
        Ok(org)
    }

    /// Admins may edit their own organization's profile; limits and the
    /// active flag stay with super admins.
    pub async fn update(
        &self,
        auth: &AuthInfo,
        id: i32,
        req: UpdateOrganizationRequest,
    ) -> Result<Organization, AppError> {
        if !auth.is_super_admin() {
            if !auth.is_admin() {
                return Err(AppError::forbidden("Admin access required"));
            }
            require_permission(&self.ctx, auth, &[perm::ORGANIZATIONS_UPDATE]).await?;
            auth.require_org(Some(id), "organization")?;
        }
        if let Some(name) = req.name.as_deref() {
            require_non_empty("name", name)?;
        }
        if let Some(color) = req.primary_color.as_deref() {
            validate_color(color)?;
        }

        let privileged = auth.is_super_admin();
        let org = self
            .ctx
            .db()
            .organizations
            .update(
                id,
                UpdateOrganizationParams {
                    name: req.name.as_deref().map(str::trim),
                    logo_url: req.logo_url.as_deref(),
                    primary_color: req.primary_color.as_deref(),
                    is_active: req.is_active.filter(|_| privileged),
                    max_users: req.max_users.filter(|_| privileged),
                    max_displays: req.max_displays.filter(|_| privileged),
                },
            )
            .await?;

        info!(organization_id = id, by = auth.user_id, "Organization updated");
        Ok(org)
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn list(
    State(svc): State<OrganizationService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<Vec<Organization>>, AppError> {
    Ok(ApiResponse::ok(svc.list(&auth).await?))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<OrganizationService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<Organization>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, id).await?))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn create(
    State(svc): State<OrganizationService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<CreateOrganizationRequest>,
) -> Result<ApiResponse<Organization>, AppError> {
    let org = svc.create(&auth, req).await?;
    Ok(ApiResponse::created(org).with_message("Organization created successfully"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn update(
    State(svc): State<OrganizationService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<UpdateOrganizationRequest>,
) -> Result<ApiResponse<Organization>, AppError> {
    let org = svc.update(&auth, id, req).await?;
    Ok(ApiResponse::ok(org).with_message("Organization updated successfully"))
}
