//! Authentication: register, login, logout, profile.

use signage_core::validation::{canonical_email, validate_email, validate_password};
use signage_core::{AppError, PermissionSet, UserRole};
use signage_db::{CreateUserParams, SsoProvider};
use tracing::{info, warn};

use super::{AuthResponse, AuthService, INVALID_CREDENTIALS, LoginRequest, Profile, RegisterRequest};
use crate::core::{TokenGenerator, password};

impl AuthService {
    /// Self-registration creates a viewer outside any organization.
    pub(super) async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        let email = canonical_email(&req.email);
        validate_email(&email)?;
        validate_password(&req.password)?;

        let db = self.ctx.db();
        if db.users.email_taken(&email, None).await? {
            warn!(email = %email, "Registration attempted with existing email");
            return Err(AppError::invalid("User with this email already exists"));
        }

        let password_hash = password::hash(&req.password)?;
        let user = db
            .users
            .create(CreateUserParams {
                email: &email,
                password_hash: Some(&password_hash),
                first_name: req.first_name.as_deref(),
                last_name: req.last_name.as_deref(),
                role: UserRole::Viewer,
                organization_id: None,
                azure_ad_id: None,
                sso_provider: SsoProvider::Local,
            })
            .await?;

        let tokens = self.ctx.create_session(&user).await?;
        info!(user_id = user.id, "User registered");

        Ok(AuthResponse { user, tokens })
    }

    pub(super) async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        let email = canonical_email(&req.email);
        let db = self.ctx.db();

        let Some(user) = db.users.find_by_email(&email).await? else {
            warn!(email = %email, "Login failed: unknown user");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        };

        let Some(hash) = user.password.as_deref() else {
            warn!(
                user_id = user.id,
                provider = %user.sso_provider,
                "Login failed: SSO-only account"
            );
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        };

        if !password::verify(&req.password, hash) {
            warn!(user_id = user.id, "Login failed: invalid password");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }

        if !user.is_active {
            warn!(user_id = user.id, "Login failed: account deactivated");
            return Err(AppError::forbidden("Account is deactivated"));
        }

        db.users.touch_last_login(user.id).await?;
        let user = db.users.get_by_id(user.id).await?;
        let tokens = self.ctx.create_session(&user).await?;

        info!(user_id = user.id, role = %user.role, "Login successful");
        Ok(AuthResponse { user, tokens })
    }

    /// Drop the session behind `refresh_token`, if any. Never fails on unknown tokens.
    pub(super) async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AppError> {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        let hash = TokenGenerator::hash_token(token);
        if let Some(user_id) = self.ctx.db().sessions.revoke(&hash).await? {
            info!(user_id, "Logged out");
        }
        Ok(())
    }

    pub(super) async fn profile(&self, user_id: i32) -> Result<Profile, AppError> {
        let db = self.ctx.db();
        let user = db.users.get_by_id(user_id).await?;

        let organization = match user.organization_id {
            Some(org_id) => Some(db.organizations.get(org_id).await?),
            None => None,
        };

        let overrides = db.permissions.overrides(user.id).await?;
        let permissions = PermissionSet::resolve(user.role, &overrides)
            .iter()
            .map(str::to_string)
            .collect();

        Ok(Profile {
            user,
            organization,
            permissions,
        })
    }
}
