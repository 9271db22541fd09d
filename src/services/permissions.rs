//! Permission guards for service methods.
//!
//! Effective permissions are the role defaults with the caller's
//! `user_permissions` overrides applied on top.

use signage_core::{AppError, AuthInfo, PermissionSet, UserRole};
use tracing::warn;

use crate::core::ServiceContext;

/// Effective permissions of the caller.
pub async fn effective(ctx: &ServiceContext, auth: &AuthInfo) -> Result<PermissionSet, AppError> {
    if auth.is_super_admin() {
        return Ok(PermissionSet::resolve(UserRole::SuperAdmin, &[]));
    }
    let overrides = ctx.db().permissions.overrides(auth.user_id).await?;
    Ok(PermissionSet::resolve(auth.role, &overrides))
}

/// Require at least one of `any_of`.
pub async fn require_permission(
    ctx: &ServiceContext,
    auth: &AuthInfo,
    any_of: &[&str],
) -> Result<(), AppError> {
    check_any(&effective(ctx, auth).await?, auth, any_of)
}

/// Require every permission in `all_of`.
pub async fn require_all_permissions(
    ctx: &ServiceContext,
    auth: &AuthInfo,
    all_of: &[&str],
) -> Result<(), AppError> {
    check_all(&effective(ctx, auth).await?, auth, all_of)
}

pub fn require_super_admin(auth: &AuthInfo) -> Result<(), AppError> {
    if auth.is_super_admin() {
        return Ok(());
    }
    warn!(user_id = auth.user_id, role = %auth.role, "Super admin access denied");
    Err(AppError::forbidden("Super admin access required"))
}

fn check_any(set: &PermissionSet, auth: &AuthInfo, any_of: &[&str]) -> Result<(), AppError> {
    if set.has_any(any_of) {
        return Ok(());
    }
    warn!(user_id = auth.user_id, role = %auth.role, required = ?any_of, "Permission denied");
    Err(AppError::forbidden("Insufficient permissions"))
}

fn check_all(set: &PermissionSet, auth: &AuthInfo, all_of: &[&str]) -> Result<(), AppError> {
    if set.has_all(all_of) {
        return Ok(());
    }
    warn!(user_id = auth.user_id, role = %auth.role, required = ?all_of, "Permission denied");
    Err(AppError::forbidden("Insufficient permissions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_core::{PermissionOverride, permissions as p};

    fn auth(role: UserRole) -> AuthInfo {
        AuthInfo {
            user_id: 3,
            email: "user@example.com".to_string(),
            role,
            organization_id: Some(1),
        }
    }

    #[test]
    fn editor_can_create_but_not_delete_categories() {
        let editor = auth(UserRole::Editor);
        let set = PermissionSet::resolve(editor.role, &[]);
        assert!(check_any(&set, &editor, &[p::CATEGORIES_CREATE]).is_ok());
        assert!(check_any(&set, &editor, &[p::CATEGORIES_DELETE]).is_err());
    }

    #[test]
    fn manage_covers_every_action() {
        let admin = auth(UserRole::Admin);
        let set = PermissionSet::resolve(admin.role, &[]);
        assert!(check_all(&set, &admin, &[p::DEVICES_READ, p::DEVICES_MANAGE]).is_ok());
        assert!(check_any(&set, &admin, &[p::PERMISSIONS_MANAGE]).is_err());
    }

    #[test]
    fn revoked_override_wins_over_role_default() {
        let viewer = auth(UserRole::Viewer);
        let overrides = [PermissionOverride {
            permission: p::POSTS_READ.to_string(),
            granted: false,
        }];
        let set = PermissionSet::resolve(viewer.role, &overrides);
        let err = check_any(&set, &viewer, &[p::POSTS_READ]).unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[test]
    fn check_all_needs_every_permission() {
        let viewer = auth(UserRole::Viewer);
        let set = PermissionSet::resolve(viewer.role, &[]);
        assert!(check_all(&set, &viewer, &[p::POSTS_READ, p::MEDIA_READ]).is_ok());
        assert!(check_all(&set, &viewer, &[p::POSTS_READ, p::POSTS_CREATE]).is_err());
    }

    #[test]
    fn super_admin_guard() {
        assert!(require_super_admin(&auth(UserRole::SuperAdmin)).is_ok());
        assert!(require_super_admin(&auth(UserRole::Admin)).is_err());
    }
}
