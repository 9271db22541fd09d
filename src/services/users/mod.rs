//! User service: account management and permission overrides.
//!
//! Organized by domain:
//! - `mod.rs` — Core types, helpers, `UserService`
//! - `handlers.rs` — Thin axum handlers
//! - `management.rs` — User CRUD operations (admin)
//! - `permissions.rs` — Permission catalogue and per-user overrides

pub mod handlers;
mod management;
mod permissions;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use signage_core::{AppError, AuthInfo, UserRole};
use signage_db::User;
use tracing::warn;

use crate::core::ServiceContext;

// ============================================================================
// UserService
// ============================================================================

#[derive(Clone)]
pub struct UserService {
    ctx: Arc<ServiceContext>,
}

impl UserService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Load a user the caller may see.
    ///
    /// Super admins are invisible to everyone else; other tenants are 403.
    async fn visible_user(&self, auth: &AuthInfo, id: i32) -> Result<User, AppError> {
        let user = self.ctx.db().users.get_by_id(id).await?;
        if user.role.is_super_admin() && !auth.is_super_admin() {
            warn!(user_id = auth.user_id, target = id, "Hidden super admin requested");
            return Err(AppError::not_found("User", id));
        }
        auth.require_org(user.organization_id, "user")?;
        Ok(user)
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub organization_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub organization_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionRequest {
    pub granted: bool,
}

/// Role option offered by the user editor.
#[derive(Debug, Serialize)]
pub struct RoleOption {
    pub value: UserRole,
    pub label: &'static str,
}

/// Permissions of one resource in the catalogue.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PermissionGroup {
    pub resource: &'static str,
    pub permissions: Vec<&'static str>,
}

/// Role defaults, overrides and the resulting effective set of a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissions {
    pub user_id: i32,
    pub role: UserRole,
    pub role_permissions: Vec<&'static str>,
    pub overrides: Vec<signage_db::UserPermission>,
    pub effective: Vec<String>,
}
