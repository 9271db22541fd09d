//! Categories: post grouping with colors and manual ordering.

use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use signage_core::validation::{require_non_empty, validate_color};
use signage_core::{AppError, AuthInfo, permissions as perm};
use signage_db::{Category, CreateCategoryParams, UpdateCategoryParams};
use tracing::{info, instrument};

use super::permissions::require_permission;
use crate::core::{ApiResponse, JsonBody, PathParam, ServiceContext, cache_keys};

pub const DEFAULT_COLOR: &str = "#c41e3a";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
    pub organization_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub ordered_ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct Reordered {
    pub updated: u64,
}

#[derive(Clone)]
pub struct CategoryService {
    ctx: Arc<ServiceContext>,
}

impl CategoryService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    pub async fn list(&self, auth: &AuthInfo) -> Result<Vec<Category>, AppError> {
        require_permission(&self.ctx, auth, &[perm::CATEGORIES_READ]).await?;
        self.ctx.db().categories.list(auth.org_scope()).await
    }

    pub async fn get(&self, auth: &AuthInfo, id: i32) -> Result<Category, AppError> {
        require_permission(&self.ctx, auth, &[perm::CATEGORIES_READ]).await?;
        let category = self.ctx.db().categories.get(id).await?;
        auth.require_org(category.organization_id, "category")?;
        Ok(category)
    }

    pub async fn create(
        &self,
        auth: &AuthInfo,
        req: CreateCategoryRequest,
    ) -> Result<Category, AppError> {
        require_permission(&self.ctx, auth, &[perm::CATEGORIES_CREATE]).await?;
        require_non_empty("name", &req.name)?;
        let color = req.color.as_deref().unwrap_or(DEFAULT_COLOR);
        validate_color(color)?;

        let organization_id = if auth.is_super_admin() {
            req.organization_id.or(auth.organization_id)
        } else {
            auth.organization_id
        };
        let name = req.name.trim();

        let db = self.ctx.db();
        if db.categories.name_exists(name, organization_id, None).await? {
            return Err(AppError::invalid("Category with this name already exists"));
        }

        let category = db
            .categories
            .create(CreateCategoryParams {
                name,
                color,
                icon: req.icon.as_deref(),
                sort_order: req.sort_order.unwrap_or(0),
                organization_id,
            })
            .await?;

        self.ctx.invalidate(&[cache_keys::PUBLIC_PREFIX]).await;
        info!(category_id = category.id, by = auth.user_id, "Category created");
        Ok(category)
    }

    pub async fn update(
        &self,
        auth: &AuthInfo,
        id: i32,
        req: UpdateCategoryRequest,
    ) -> Result<Category, AppError> {
        require_permission(&self.ctx, auth, &[perm::CATEGORIES_UPDATE]).await?;
        let existing = self.ctx.db().categories.get(id).await?;
        auth.require_org(existing.organization_id, "category")?;

        let name = req.name.as_deref().map(str::trim);
        if let Some(name) = name {
            require_non_empty("name", name)?;
            if self
                .ctx
                .db()
                .categories
                .name_exists(name, existing.organization_id, Some(id))
                .await?
            {
                return Err(AppError::invalid("Category with this name already exists"));
            }
        }
        if let Some(color) = req.color.as_deref() {
            validate_color(color)?;
        }

        let category = self
            .ctx
            .db()
            .categories
            .update(
                id,
                UpdateCategoryParams {
                    name,
                    color: req.color.as_deref(),
                    icon: req.icon.as_deref(),
                    sort_order: req.sort_order,
                    is_active: req.is_active,
                },
            )
            .await?;

        self.ctx.invalidate(&[cache_keys::PUBLIC_PREFIX]).await;
        info!(category_id = id, by = auth.user_id, "Category updated");
        Ok(category)
    }

    pub async fn delete(&self, auth: &AuthInfo, id: i32) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, &[perm::CATEGORIES_DELETE]).await?;
        let db = self.ctx.db();
        let existing = db.categories.get(id).await?;
        auth.require_org(existing.organization_id, "category")?;

        let posts = db.categories.count_posts(id).await?;
        if posts > 0 {
            return Err(AppError::invalid(format!(
                "Cannot delete category: {posts} post(s) still use it"
            )));
        }

        db.categories.delete(id).await?;
        self.ctx.invalidate(&[cache_keys::PUBLIC_PREFIX]).await;
        info!(category_id = id, by = auth.user_id, "Category deleted");
        Ok(())
    }

    /// Sort order follows the position in `ordered_ids`.
    pub async fn reorder(&self, auth: &AuthInfo, ordered_ids: &[i32]) -> Result<u64, AppError> {
        require_permission(&self.ctx, auth, &[perm::CATEGORIES_UPDATE]).await?;
        if ordered_ids.is_empty() {
            return Err(AppError::invalid("orderedIds must not be empty"));
        }

        let updated = self
            .ctx
            .db()
            .categories
            .reorder(auth.org_scope(), ordered_ids)
            .await?;

        self.ctx.invalidate(&[cache_keys::PUBLIC_PREFIX]).await;
        info!(updated, by = auth.user_id, "Categories reordered");
        Ok(updated)
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn list(
    State(svc): State<CategoryService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<Vec<Category>>, AppError> {
    Ok(ApiResponse::ok(svc.list(&auth).await?))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<CategoryService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<Category>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, id).await?))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn create(
    State(svc): State<CategoryService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<CreateCategoryRequest>,
) -> Result<ApiResponse<Category>, AppError> {
    let category = svc.create(&auth, req).await?;
    Ok(ApiResponse::created(category).with_message("Category created successfully"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn update(
    State(svc): State<CategoryService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<UpdateCategoryRequest>,
) -> Result<ApiResponse<Category>, AppError> {
    let category = svc.update(&auth, id, req).await?;
    Ok(ApiResponse::ok(category).with_message("Category updated successfully"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn delete(
    State(svc): State<CategoryService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<()>, AppError> {
    svc.delete(&auth, id).await?;
    Ok(ApiResponse::message("Category deleted successfully"))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn reorder(
    State(svc): State<CategoryService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<ReorderRequest>,
) -> Result<ApiResponse<Reordered>, AppError> {
    let updated = svc.reorder(&auth, &req.ordered_ids).await?;
    Ok(ApiResponse::ok(Reordered { updated }).with_message("Categories reordered"))
}
