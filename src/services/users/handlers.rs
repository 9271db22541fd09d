//! Thin axum handlers for `/api/users` and `/api/permissions`.

use axum::Extension;
use axum::extract::State;
use signage_core::{AppError, AuthInfo};
use signage_db::User;
use tracing::instrument;

use super::management::available_roles;
use super::permissions::catalogue;
use super::{
    CreateUserRequest, PermissionGroup, ResetPasswordRequest, RoleOption, SetPermissionRequest,
    UpdateUserRequest, UserListQuery, UserPermissions, UserService,
};
use crate::core::{ApiResponse, JsonBody, PathParam, QueryParams};

// ============================================================================
// User Management
// ============================================================================

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn list(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    QueryParams(query): QueryParams<UserListQuery>,
) -> Result<ApiResponse<Vec<User>>, AppError> {
    let (users, pagination) = svc.list(&auth, &query).await?;
    Ok(ApiResponse::ok(users).with_pagination(pagination))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<User>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, id).await?))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn create(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let user = svc.create(&auth, req).await?;
    Ok(ApiResponse::created(user).with_message("User created successfully"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn update(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let user = svc.update(&auth, id, req).await?;
    Ok(ApiResponse::ok(user).with_message("User updated successfully"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn delete(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<()>, AppError> {
    svc.delete(&auth, id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn toggle_active(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<User>, AppError> {
    let user = svc.toggle_active(&auth, id).await?;
    let message = if user.is_active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(ApiResponse::ok(user).with_message(message))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn reset_password(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    svc.reset_password(&auth, id, &req.new_password).await?;
    Ok(ApiResponse::message("Password reset successfully"))
}

pub async fn roles(Extension(auth): Extension<AuthInfo>) -> ApiResponse<Vec<RoleOption>> {
    ApiResponse::ok(available_roles(auth.role))
}

// ============================================================================
// Permissions
// ============================================================================

pub async fn permission_catalogue() -> ApiResponse<Vec<PermissionGroup>> {
    ApiResponse::ok(catalogue())
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn user_permissions(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<UserPermissions>, AppError> {
    Ok(ApiResponse::ok(svc.user_permissions(&auth, id).await?))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn set_permission(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam((id, permission)): PathParam<(i32, String)>,
    JsonBody(req): JsonBody<SetPermissionRequest>,
) -> Result<ApiResponse<UserPermissions>, AppError> {
    let result = svc.set_permission(&auth, id, &permission, req.granted).await?;
    Ok(ApiResponse::ok(result).with_message("Permission updated"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn clear_permission(
    State(svc): State<UserService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam((id, permission)): PathParam<(i32, String)>,
) -> Result<ApiResponse<UserPermissions>, AppError> {
    let result = svc.clear_permission(&auth, id, &permission).await?;
    Ok(ApiResponse::ok(result).with_message("Permission reset to role default"))
}
