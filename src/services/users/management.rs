//! User management: CRUD operations (admin).

use signage_core::validation::{canonical_email, validate_email, validate_password};
use signage_core::{AppError, AuthInfo, UserRole, permissions as perm};
use signage_db::{CreateUserParams, Page, SsoProvider, UpdateUserParams, User, UserListParams};
use tracing::{info, warn};

use super::{CreateUserRequest, RoleOption, UpdateUserRequest, UserListQuery, UserService};
use crate::core::{Pagination, password};
use crate::services::permissions::require_permission;

/// Default page size of the user list.
const DEFAULT_LIMIT: u32 = 20;

impl UserService {
    pub(super) async fn list(
        &self,
        auth: &AuthInfo,
        query: &UserListQuery,
    ) -> Result<(Vec<User>, Pagination), AppError> {
        require_permission(&self.ctx, auth, &[perm::USERS_READ]).await?;

        let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
        let (users, total) = self
            .ctx
            .db()
            .users
            .list(UserListParams {
                scope: auth.org_scope(),
                include_super_admins: auth.is_super_admin(),
                search: query.search.as_deref().filter(|s| !s.trim().is_empty()),
                role: query.role,
                is_active: query.is_active,
                page,
            })
            .await?;

        Ok((users, Pagination::new(page, total)))
    }

    pub(super) async fn get(&self, auth: &AuthInfo, id: i32) -> Result<User, AppError> {
        require_permission(&self.ctx, auth, &[perm::USERS_READ]).await?;
        self.visible_user(auth, id).await
    }

    pub(super) async fn create(
        &self,
        auth: &AuthInfo,
        req: CreateUserRequest,
    ) -> Result<User, AppError> {
        require_permission(&self.ctx, auth, &[perm::USERS_CREATE]).await?;

        let email = canonical_email(&req.email);
        validate_email(&email)?;
        validate_password(&req.password)?;

        if !auth.role.can_assign(req.role) {
            warn!(user_id = auth.user_id, role = %req.role, "Attempt to assign role above own");
            return Err(AppError::forbidden(format!(
                "You cannot create users with role '{}'",
                req.role
            )));
        }

        let db = self.ctx.db();
        if db.users.email_taken(&email, None).await? {
            return Err(AppError::invalid("User with this email already exists"));
        }

        // Only super admins place users into other organizations.
        let organization_id = if auth.is_super_admin() {
            req.organization_id
        } else {
            auth.organization_id
        };

        let password_hash = password::hash(&req.password)?;
        let user = db
            .users
            .create(CreateUserParams {
                email: &email,
                password_hash: Some(&password_hash),
                first_name: req.first_name.as_deref(),
                last_name: req.last_name.as_deref(),
                role: req.role,
                organization_id,
                azure_ad_id: None,
                sso_provider: SsoProvider::Local,
            })
            .await?;

        info!(user_id = user.id, created_by = auth.user_id, role = %user.role, "User created");
        Ok(user)
    }

    pub(super) async fn update(
        &self,
        auth: &AuthInfo,
        id: i32,
        req: UpdateUserRequest,
    ) -> Result<User, AppError> {
        require_permission(&self.ctx, auth, &[perm::USERS_UPDATE]).await?;
        let target = self.visible_user(auth, id).await?;
        let is_self = id == auth.user_id;

        if !is_self && !auth.is_super_admin() && !auth.role.can_assign(target.role) {
            return Err(AppError::forbidden("You cannot modify this user"));
        }

        if let Some(role) = req.role.filter(|r| *r != target.role) {
            if is_self {
                return Err(AppError::invalid("You cannot change your own role"));
            }
            if !auth.role.can_assign(role) {
                warn!(user_id = auth.user_id, target = id, role = %role, "Role escalation denied");
                return Err(AppError::forbidden(format!("You cannot assign role '{role}'")));
            }
        }

        let email = req.email.as_deref().map(canonical_email);
        if let Some(email) = email.as_deref() {
            validate_email(email)?;
            if self.ctx.db().users.email_taken(email, Some(id)).await? {
                return Err(AppError::invalid("User with this email already exists"));
            }
        }

        let user = self
            .ctx
            .db()
            .users
            .update(
                id,
                UpdateUserParams {
                    email: email.as_deref(),
                    first_name: req.first_name.as_deref(),
                    last_name: req.last_name.as_deref(),
                    role: req.role,
                    is_active: req.is_active.filter(|_| !is_self),
                    organization_id: req.organization_id.filter(|_| auth.is_super_admin()),
                },
            )
            .await?;

        info!(user_id = id, updated_by = auth.user_id, "User updated");
        Ok(user)
    }

    pub(super) async fn delete(&self, auth: &AuthInfo, id: i32) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, &[perm::USERS_DELETE]).await?;
        if id == auth.user_id {
            return Err(AppError::invalid("You cannot delete your own account"));
        }
        self.visible_user(auth, id).await?;

        self.ctx.db().users.delete(id).await?;
        info!(user_id = id, deleted_by = auth.user_id, "User deleted");
        Ok(())
    }

    pub(super) async fn toggle_active(&self, auth: &AuthInfo, id: i32) -> Result<User, AppError> {
        require_permission(&self.ctx, auth, &[perm::USERS_UPDATE]).await?;
        if id == auth.user_id {
            return Err(AppError::invalid("You cannot deactivate your own account"));
        }
        self.visible_user(auth, id).await?;

        let user = self.ctx.db().users.toggle_active(id).await?;
        if !user.is_active {
            self.ctx.db().sessions.revoke_all_for_user(id).await?;
        }
        info!(
            user_id = id,
            is_active = user.is_active,
            by = auth.user_id,
            "User active flag toggled"
        );
        Ok(user)
    }

    pub(super) async fn reset_password(
        &self,
        auth: &AuthInfo,
        id: i32,
        new_password: &str,
    ) -> Result<(), AppError> {
        let target = self.visible_user(auth, id).await?;
        if id != auth.user_id && !auth.role.can_reset_password_for(target.role) {
            warn!(user_id = auth.user_id, target = id, "Password reset denied");
            return Err(AppError::forbidden(
                "You cannot reset the password of this user",
            ));
        }
        validate_password(new_password)?;

        let hash = password::hash(new_password)?;
        self.ctx.db().users.set_password(id, &hash).await?;
        info!(user_id = id, by = auth.user_id, "Password reset");
        Ok(())
    }
}

/// Roles the caller may hand out, with labels for the editor.
#[must_use]
pub(super) fn available_roles(role: UserRole) -> Vec<RoleOption> {
    role.assignable_roles()
        .iter()
        .map(|&value| RoleOption {
            value,
            label: role_label(value),
        })
        .collect()
}

const fn role_label(role: UserRole) -> &'static str {
    match role {
        UserRole::SuperAdmin => "Super Admin",
        UserRole::Admin => "Administrator",
        UserRole::Editor => "Editor",
        UserRole::Viewer => "Viewer",
        UserRole::Display => "Display",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_offered_lower_roles_only() {
        let roles: Vec<_> = available_roles(UserRole::Admin)
            .into_iter()
            .map(|o| o.value)
            .collect();
        assert_eq!(
            roles,
            vec![UserRole::Editor, UserRole::Viewer, UserRole::Display]
        );
    }

    #[test]
    fn editors_are_offered_nothing() {
        assert!(available_roles(UserRole::Editor).is_empty());
    }

    #[test]
    fn super_admin_sees_labels_for_all_roles() {
        let options = available_roles(UserRole::SuperAdmin);
        assert_eq!(options.len(), UserRole::ALL.len());
        assert_eq!(options[0].label, "Super Admin");
    }
}
