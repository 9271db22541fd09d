//! Permission catalogue and per-user overrides.

use signage_core::{AppError, AuthInfo, PermissionSet, permissions as perm};
use tracing::info;

use super::{PermissionGroup, UserPermissions, UserService};
use crate::services::permissions::{require_permission, require_super_admin};

impl UserService {
    pub(super) async fn user_permissions(
        &self,
        auth: &AuthInfo,
        id: i32,
    ) -> Result<UserPermissions, AppError> {
        if id != auth.user_id {
            require_permission(&self.ctx, auth, &[perm::USERS_READ, perm::PERMISSIONS_MANAGE])
                .await?;
        }
        let user = self.visible_user(auth, id).await?;

        let db = self.ctx.db();
        let overrides = db.permissions.list_for_user(id).await?;
        let effective = PermissionSet::resolve(user.role, &db.permissions.overrides(id).await?)
            .iter()
            .map(str::to_string)
            .collect();

        Ok(UserPermissions {
            user_id: id,
            role: user.role,
            role_permissions: user.role.default_permissions().to_vec(),
            overrides,
            effective,
        })
    }

    /// Grant or revoke a single permission for a user.
    pub(super) async fn set_permission(
        &self,
        auth: &AuthInfo,
        id: i32,
        permission: &str,
        granted: bool,
    ) -> Result<UserPermissions, AppError> {
        self.guard_override(auth, id, permission).await?;

        self.ctx
            .db()
            .permissions
            .set_override(id, permission, granted)
            .await?;
        info!(user_id = id, permission, granted, by = auth.user_id, "Permission override set");

        self.user_permissions(auth, id).await
    }

    /// Remove an override so the role default applies again.
    pub(super) async fn clear_permission(
        &self,
        auth: &AuthInfo,
        id: i32,
        permission: &str,
    ) -> Result<UserPermissions, AppError> {
        self.guard_override(auth, id, permission).await?;

        if !self.ctx.db().permissions.clear_override(id, permission).await? {
            return Err(AppError::not_found("Permission override", permission));
        }
        info!(user_id = id, permission, by = auth.user_id, "Permission override cleared");

        self.user_permissions(auth, id).await
    }

    async fn guard_override(
        &self,
        auth: &AuthInfo,
        id: i32,
        permission: &str,
    ) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, &[perm::PERMISSIONS_MANAGE]).await?;
        if !perm::is_known(permission) {
            return Err(AppError::invalid(format!("Unknown permission: {permission}")));
        }
        if id == auth.user_id {
            return Err(AppError::invalid("You cannot change your own permissions"));
        }
        let target = self.visible_user(auth, id).await?;
        if target.role.is_super_admin() {
            require_super_admin(auth)?;
        }
        Ok(())
    }
}

/// The permission catalogue grouped by resource, in catalogue order.
#[must_use]
pub(super) fn catalogue() -> Vec<PermissionGroup> {
    let mut groups: Vec<PermissionGroup> = Vec::new();
    for &name in perm::ALL {
        let resource = name.split_once('.').map_or(name, |(r, _)| r);
        match groups.last_mut() {
            Some(group) if group.resource == resource => group.permissions.push(name),
            _ => groups.push(PermissionGroup {
                resource,
                permissions: vec![name],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_groups_by_resource() {
        let groups = catalogue();
        let resources: Vec<_> = groups.iter().map(|g| g.resource).collect();
        assert_eq!(
            resources,
            vec![
                "posts",
                "categories",
                "users",
                "organizations",
                "media",
                "displays",
                "devices",
                "settings",
                "permissions",
                "roles",
                "system"
            ]
        );
        assert_eq!(groups[0].permissions.len(), 5);
    }

    #[test]
    fn catalogue_covers_every_permission() {
        let total: usize = catalogue().iter().map(|g| g.permissions.len()).sum();
        assert_eq!(total, perm::ALL.len());
    }
}
