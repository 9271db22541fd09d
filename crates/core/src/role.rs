//! User roles and the permission model.
//!
//! Permissions are named `resource.action`. Holding `resource.manage`
//! grants every action on that resource. Per-user overrides take
//! precedence over the role defaults.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// User role, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    Editor,
    Viewer,
    Display,
}

impl UserRole {
    pub const ALL: [Self; 5] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::Editor,
        Self::Viewer,
        Self::Display,
    ];

    /// Returns the string representation as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
            Self::Display => "display",
        }
    }

    /// Roles this role may assign to other users.
    #[must_use]
    pub const fn assignable_roles(self) -> &'static [Self] {
        match self {
            Self::SuperAdmin => &Self::ALL,
            Self::Admin => &[Self::Editor, Self::Viewer, Self::Display],
            Self::Editor | Self::Viewer | Self::Display => &[],
        }
    }

    #[must_use]
    pub fn can_assign(self, target: Self) -> bool {
        self.assignable_roles().contains(&target)
    }

    /// Whether a user with this role may reset the password of `target`.
    ///
    /// Resetting one's own password is handled by the caller.
    #[must_use]
    pub const fn can_reset_password_for(self, target: Self) -> bool {
        match self {
            Self::SuperAdmin => true,
            Self::Admin => matches!(target, Self::Editor | Self::Viewer | Self::Display),
            Self::Editor | Self::Viewer | Self::Display => false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_super_admin(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// Default permissions granted to this role.
    #[must_use]
    pub fn default_permissions(self) -> &'static [&'static str] {
        use permissions::*;
        match self {
            Self::SuperAdmin => ALL,
            Self::Admin => &[
                POSTS_MANAGE,
                CATEGORIES_MANAGE,
                USERS_READ,
                USERS_CREATE,
                USERS_UPDATE,
                ORGANIZATIONS_READ,
                ORGANIZATIONS_UPDATE,
                MEDIA_MANAGE,
                DISPLAYS_MANAGE,
                DEVICES_MANAGE,
                SETTINGS_READ,
                SETTINGS_WRITE,
            ],
            Self::Editor => &[
                POSTS_CREATE,
                POSTS_READ,
                POSTS_UPDATE,
                POSTS_DELETE,
                CATEGORIES_CREATE,
                CATEGORIES_READ,
                CATEGORIES_UPDATE,
                MEDIA_UPLOAD,
                MEDIA_READ,
                USERS_READ,
                DISPLAYS_READ,
                SETTINGS_READ,
            ],
            Self::Viewer => &[POSTS_READ, CATEGORIES_READ, MEDIA_READ, DISPLAYS_READ],
            Self::Display => &[POSTS_READ, CATEGORIES_READ, MEDIA_READ],
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            "display" => Ok(Self::Display),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map_err(|_| UnknownVariant {
            kind: "role",
            value,
        })
    }
}

/// Error for text columns holding an unexpected enum value.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Permission names.
pub mod permissions {
    pub const POSTS_CREATE: &str = "posts.create";
    pub const POSTS_READ: &str = "posts.read";
    pub const POSTS_UPDATE: &str = "posts.update";
    pub const POSTS_DELETE: &str = "posts.delete";
    pub const POSTS_MANAGE: &str = "posts.manage";

    pub const CATEGORIES_CREATE: &str = "categories.create";
    pub const CATEGORIES_READ: &str = "categories.read";
    pub const CATEGORIES_UPDATE: &str = "categories.update";
    pub const CATEGORIES_DELETE: &str = "categories.delete";
    pub const CATEGORIES_MANAGE: &str = "categories.manage";

    pub const USERS_CREATE: &str = "users.create";
    pub const USERS_READ: &str = "users.read";
    pub const USERS_UPDATE: &str = "users.update";
    pub const USERS_DELETE: &str = "users.delete";
    pub const USERS_MANAGE: &str = "users.manage";

    pub const ORGANIZATIONS_CREATE: &str = "organizations.create";
    pub const ORGANIZATIONS_READ: &str = "organizations.read";
    pub const ORGANIZATIONS_UPDATE: &str = "organizations.update";
    pub const ORGANIZATIONS_DELETE: &str = "organizations.delete";
    pub const ORGANIZATIONS_MANAGE: &str = "organizations.manage";

    pub const MEDIA_UPLOAD: &str = "media.upload";
    pub const MEDIA_READ: &str = "media.read";
    pub const MEDIA_DELETE: &str = "media.delete";
    pub const MEDIA_MANAGE: &str = "media.manage";

    pub const DISPLAYS_CREATE: &str = "displays.create";
    pub const DISPLAYS_READ: &str = "displays.read";
    pub const DISPLAYS_UPDATE: &str = "displays.update";
    pub const DISPLAYS_DELETE: &str = "displays.delete";
    pub const DISPLAYS_MANAGE: &str = "displays.manage";

    pub const DEVICES_READ: &str = "devices.read";
    pub const DEVICES_MANAGE: &str = "devices.manage";

    pub const SETTINGS_READ: &str = "settings.read";
    pub const SETTINGS_WRITE: &str = "settings.write";

    pub const PERMISSIONS_MANAGE: &str = "permissions.manage";
    pub const ROLES_MANAGE: &str = "roles.manage";

    pub const SYSTEM_SETTINGS: &str = "system.settings";
    pub const SYSTEM_LOGS: &str = "system.logs";

    /// The full permission catalogue.
    pub const ALL: &[&str] = &[
        POSTS_CREATE,
        POSTS_READ,
        POSTS_UPDATE,
        POSTS_DELETE,
        POSTS_MANAGE,
        CATEGORIES_CREATE,
        CATEGORIES_READ,
        CATEGORIES_UPDATE,
        CATEGORIES_DELETE,
        CATEGORIES_MANAGE,
        USERS_CREATE,
        USERS_READ,
        USERS_UPDATE,
        USERS_DELETE,
        USERS_MANAGE,
        ORGANIZATIONS_CREATE,
        ORGANIZATIONS_READ,
        ORGANIZATIONS_UPDATE,
        ORGANIZATIONS_DELETE,
        ORGANIZATIONS_MANAGE,
        MEDIA_UPLOAD,
        MEDIA_READ,
        MEDIA_DELETE,
        MEDIA_MANAGE,
        DISPLAYS_CREATE,
        DISPLAYS_READ,
        DISPLAYS_UPDATE,
        DISPLAYS_DELETE,
        DISPLAYS_MANAGE,
        DEVICES_READ,
        DEVICES_MANAGE,
        SETTINGS_READ,
        SETTINGS_WRITE,
        PERMISSIONS_MANAGE,
        ROLES_MANAGE,
        SYSTEM_SETTINGS,
        SYSTEM_LOGS,
    ];

    /// Returns true if `name` is a known permission.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// A single per-user permission override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverride {
    pub permission: String,
    pub granted: bool,
}

/// Effective permission set of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    /// Resolve role defaults, then apply per-user overrides on top.
    #[must_use]
    pub fn resolve(role: UserRole, overrides: &[PermissionOverride]) -> Self {
        let mut set: BTreeSet<String> = role
            .default_permissions()
            .iter()
            .map(|p| (*p).to_string())
            .collect();

        for o in overrides {
            if o.granted {
                set.insert(o.permission.clone());
            } else {
                set.remove(&o.permission);
            }
        }

        Self(set)
    }

    /// Check a single permission, honouring `resource.manage`.
    #[must_use]
    pub fn has(&self, permission: &str) -> bool {
        if self.0.contains(permission) {
            return true;
        }
        permission
            .split_once('.')
            .is_some_and(|(resource, _)| self.0.contains(&format!("{resource}.manage")))
    }

    #[must_use]
    pub fn has_any(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has(p))
    }

    #[must_use]
    pub fn has_all(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::permissions::*;
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("SUPER_ADMIN".parse::<UserRole>().unwrap(), UserRole::SuperAdmin);
        assert_eq!("editor".parse::<UserRole>().unwrap(), UserRole::Editor);
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn admin_assigns_only_lower_roles() {
        assert!(UserRole::Admin.can_assign(UserRole::Editor));
        assert!(UserRole::Admin.can_assign(UserRole::Display));
        assert!(!UserRole::Admin.can_assign(UserRole::Admin));
        assert!(!UserRole::Admin.can_assign(UserRole::SuperAdmin));
        assert!(UserRole::SuperAdmin.can_assign(UserRole::SuperAdmin));
        assert!(UserRole::Editor.assignable_roles().is_empty());
    }

    #[test]
    fn password_reset_rules() {
        assert!(UserRole::SuperAdmin.can_reset_password_for(UserRole::Admin));
        assert!(UserRole::Admin.can_reset_password_for(UserRole::Viewer));
        assert!(!UserRole::Admin.can_reset_password_for(UserRole::Admin));
        assert!(!UserRole::Editor.can_reset_password_for(UserRole::Viewer));
    }

    #[test]
    fn manage_implies_every_action() {
        let set = PermissionSet::resolve(UserRole::Admin, &[]);
        assert!(set.has(POSTS_DELETE));
        assert!(set.has(DISPLAYS_CREATE));
        assert!(!set.has(SYSTEM_LOGS));
    }

    #[test]
    fn user_override_wins_over_role() {
        let overrides = vec![
            PermissionOverride {
                permission: POSTS_DELETE.to_string(),
                granted: false,
            },
            PermissionOverride {
                permission: SETTINGS_WRITE.to_string(),
                granted: true,
            },
        ];
        let set = PermissionSet::resolve(UserRole::Editor, &overrides);
        assert!(!set.has(POSTS_DELETE));
        assert!(set.has(SETTINGS_WRITE));
        assert!(set.has(POSTS_READ));
    }

    #[test]
    fn any_and_all_checks() {
        let set = PermissionSet::resolve(UserRole::Viewer, &[]);
        assert!(set.has_any(&[POSTS_CREATE, POSTS_READ]));
        assert!(!set.has_all(&[POSTS_CREATE, POSTS_READ]));
    }

    #[test]
    fn super_admin_holds_full_catalogue() {
        let set = PermissionSet::resolve(UserRole::SuperAdmin, &[]);
        assert!(ALL.iter().all(|p| set.has(p)));
        assert!(is_known(DEVICES_MANAGE));
        assert!(!is_known("devices.fly"));
    }
}
