//! Federated login: Azure AD (OIDC authorization code + PKCE) and LDAP.
//!
//! - `config.rs` — Environment settings and their redacted view
//! - `azure.rs` — Authorization redirect, callback, logout
//! - `ldap.rs` — Directory bind, search, and group mapping
//! - `handlers.rs` — Thin axum handlers

mod azure;
mod config;
pub mod handlers;
mod ldap;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use signage_core::validation::canonical_email;
use signage_core::{AppError, UserRole};
use signage_db::{CreateUserParams, SsoProvider, User};
use tracing::{info, warn};

pub use config::{SsoConfig, SsoConfigView, SsoProviderKind};

use crate::core::ServiceContext;

// ============================================================================
// SsoService
// ============================================================================

#[derive(Clone)]
pub struct SsoService {
    ctx: Arc<ServiceContext>,
}

impl SsoService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Public SSO status shown on the login page.
    #[must_use]
    pub fn status(&self) -> SsoStatus {
        let sso = self.ctx.sso();
        let errors = sso.validate();
        SsoStatus {
            enabled: sso.enabled,
            provider: sso.provider,
            configured: sso.enabled && errors.is_empty(),
            auto_create_users: sso.auto_create_users,
            allowed_domains: sso.allowed_domains(),
            login_url: sso.azure_enabled().then(|| LOGIN_PATH.to_string()),
            errors: sso.enabled.then_some(errors),
        }
    }

    /// Find or create the local account for a federated identity.
    async fn provision(&self, identity: &FederatedIdentity) -> Result<User, SsoFailure> {
        let sso = self.ctx.sso();
        let db = self.ctx.db();

        if !sso.is_domain_allowed(&identity.email) {
            warn!(email = %identity.email, "SSO login from a domain that is not allowed");
            return Err(SsoFailure::DomainNotAllowed);
        }

        let mut existing = db.users.find_by_email(&identity.email).await?;
        if existing.is_none()
            && identity.provider == SsoProvider::AzureAd
            && let Some(external_id) = identity.external_id.as_deref()
        {
            existing = db.users.find_by_azure_ad_id(external_id).await?;
        }

        let user = match existing {
            Some(user) => match account_link(&user, identity) {
                Some(link) => {
                    info!(user_id = user.id, provider = %link.provider, "Linking existing account");
                    db.users
                        .link_sso(
                            user.id,
                            link.provider,
                            link.external_id,
                            link.first_name,
                            link.last_name,
                        )
                        .await?
                }
                None => user,
            },
            None => self.create_user(identity).await?,
        };

        if !user.is_active {
            warn!(user_id = user.id, "SSO login for a deactivated account");
            return Err(SsoFailure::UserInactive);
        }

        db.users.touch_last_login(user.id).await?;
        Ok(db.users.get_by_id(user.id).await?)
    }

    async fn create_user(&self, identity: &FederatedIdentity) -> Result<User, SsoFailure> {
        let sso = self.ctx.sso();
        let db = self.ctx.db();

        if !sso.auto_create_users {
            warn!(email = %identity.email, "SSO user unknown and auto-creation disabled");
            return Err(SsoFailure::UserNotFound);
        }

        let Some(organization) = db.organizations.first_active().await? else {
            warn!(email = %identity.email, "No active organization for SSO user");
            return Err(SsoFailure::NoOrganization);
        };

        let role = initial_role(identity, sso.default_role);
        let user = db
            .users
            .create(CreateUserParams {
                email: &identity.email,
                password_hash: None,
                first_name: identity.first_name.as_deref(),
                last_name: identity.last_name.as_deref(),
                role,
                organization_id: Some(organization.id),
                azure_ad_id: identity.external_id.as_deref(),
                sso_provider: identity.provider,
            })
            .await?;

        info!(
            user_id = user.id,
            organization_id = organization.id,
            provider = %identity.provider,
            role = %role,
            "SSO user created"
        );
        Ok(user)
    }
}

/// Start of the Azure AD flow.
const LOGIN_PATH: &str = "/api/auth/sso/login";

// ============================================================================
// Provisioning
// ============================================================================

/// Identity asserted by the external provider.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FederatedIdentity {
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    /// Azure object id, or the LDAP distinguished name.
    external_id: Option<String>,
    /// Role implied by directory groups, if any.
    role: Option<UserRole>,
    provider: SsoProvider,
}

impl FederatedIdentity {
    fn new(email: &str, provider: SsoProvider) -> Self {
        Self {
            email: canonical_email(email),
            first_name: None,
            last_name: None,
            external_id: None,
            role: None,
            provider,
        }
    }
}

/// Profile changes for an existing account on federated login.
#[derive(Debug, PartialEq, Eq)]
struct AccountLink<'a> {
    provider: SsoProvider,
    external_id: Option<&'a str>,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
}

/// How an existing account is updated on federated login, if at all.
///
/// Existing accounts keep their role. Directory groups only choose the
/// role of accounts created on first login.
fn account_link<'a>(user: &User, identity: &'a FederatedIdentity) -> Option<AccountLink<'a>> {
    match identity.provider {
        SsoProvider::Ldap => Some(AccountLink {
            provider: SsoProvider::Ldap,
            external_id: identity.external_id.as_deref(),
            first_name: identity.first_name.as_deref(),
            last_name: identity.last_name.as_deref(),
        }),
        SsoProvider::AzureAd if user.azure_ad_id.is_none() => Some(AccountLink {
            provider: SsoProvider::AzureAd,
            external_id: identity.external_id.as_deref(),
            first_name: None,
            last_name: None,
        }),
        _ => None,
    }
}

/// Role of an account created on first federated login.
fn initial_role(identity: &FederatedIdentity, default_role: UserRole) -> UserRole {
    identity.role.unwrap_or(default_role)
}

/// Why a federated login did not produce a session.
#[derive(Debug, thiserror::Error)]
enum SsoFailure {
    #[error("SSO is not configured")]
    NotConfigured,
    #[error("Could not start the SSO login")]
    InitFailed,
    #[error("Missing code or state")]
    InvalidResponse,
    #[error("Login request expired")]
    StateExpired,
    #[error("Token exchange failed")]
    TokenFailed,
    #[error("Provider returned no e-mail address")]
    NoEmail,
    #[error("E-mail domain is not allowed")]
    DomainNotAllowed,
    #[error("User not found and automatic creation is disabled")]
    UserNotFound,
    #[error("No active organization available for new users")]
    NoOrganization,
    #[error("Account is deactivated")]
    UserInactive,
    #[error(transparent)]
    Backend(#[from] AppError),
}

impl SsoFailure {
    /// Error code appended to the admin login redirect.
    const fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "sso_not_configured",
            Self::InitFailed => "sso_init_failed",
            Self::InvalidResponse => "sso_invalid_response",
            Self::StateExpired => "sso_state_expired",
            Self::TokenFailed => "sso_token_failed",
            Self::NoEmail => "sso_no_email",
            Self::DomainNotAllowed => "sso_domain_not_allowed",
            Self::UserNotFound => "sso_user_not_found",
            Self::NoOrganization => "sso_no_organization",
            Self::UserInactive => "sso_user_inactive",
            Self::Backend(_) => "sso_callback_failed",
        }
    }
}

impl From<SsoFailure> for AppError {
    fn from(failure: SsoFailure) -> Self {
        match failure {
            SsoFailure::Backend(err) => err,
            SsoFailure::NotConfigured => Self::invalid("SSO is not configured"),
            other => Self::forbidden(other.to_string()),
        }
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoStatus {
    pub enabled: bool,
    pub provider: SsoProviderKind,
    pub configured: bool,
    pub auto_create_users: bool,
    pub allowed_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Admin UI path to return to after login.
    pub redirect: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct LdapLoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub use ldap::ConnectionReport;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(role: UserRole, azure_ad_id: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: 7,
            email: "root@example.com".to_string(),
            password: None,
            first_name: Some("Old".to_string()),
            last_name: None,
            role,
            is_active: true,
            organization_id: Some(1),
            azure_ad_id: azure_ad_id.map(str::to_string),
            sso_provider: SsoProvider::Local,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ldap_identity(role: Option<UserRole>) -> FederatedIdentity {
        let mut identity = FederatedIdentity::new("root@example.com", SsoProvider::Ldap);
        identity.external_id = Some("cn=root,dc=example,dc=com".to_string());
        identity.first_name = Some("Root".to_string());
        identity.role = role;
        identity
    }

    #[test]
    fn ldap_login_keeps_the_role_of_an_existing_super_admin() {
        let user = account(UserRole::SuperAdmin, None);
        let identity = ldap_identity(Some(UserRole::Editor));

        let link = account_link(&user, &identity).unwrap();
        assert_eq!(
            link,
            AccountLink {
                provider: SsoProvider::Ldap,
                external_id: Some("cn=root,dc=example,dc=com"),
                first_name: Some("Root"),
                last_name: None,
            }
        );
    }

    #[test]
    fn directory_role_applies_to_new_accounts() {
        assert_eq!(
            initial_role(&ldap_identity(Some(UserRole::Admin)), UserRole::Editor),
            UserRole::Admin
        );
        assert_eq!(initial_role(&ldap_identity(None), UserRole::Viewer), UserRole::Viewer);
    }

    #[test]
    fn azure_accounts_are_linked_once() {
        let identity = FederatedIdentity::new("root@example.com", SsoProvider::AzureAd);
        assert!(account_link(&account(UserRole::Admin, None), &identity).is_some());
        assert!(account_link(&account(UserRole::Admin, Some("oid-1")), &identity).is_none());
    }

    #[test]
    fn failures_map_to_redirect_codes() {
        assert_eq!(SsoFailure::DomainNotAllowed.code(), "sso_domain_not_allowed");
        assert_eq!(SsoFailure::UserInactive.code(), "sso_user_inactive");
        assert_eq!(
            SsoFailure::Backend(AppError::Internal("db".into())).code(),
            "sso_callback_failed"
        );
    }

    #[test]
    fn failures_become_forbidden_for_json_clients() {
        let err: AppError = SsoFailure::UserNotFound.into();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let err: AppError = SsoFailure::Backend(AppError::Unavailable("down".into())).into();
        assert!(matches!(err, AppError::Unavailable(_)));
    }

    #[test]
    fn identity_email_is_canonical() {
        let identity = FederatedIdentity::new("  Jane.Doe@Example.COM ", SsoProvider::AzureAd);
        assert_eq!(identity.email, "jane.doe@example.com");
    }

    #[test]
    fn callback_query_accepts_provider_errors() {
        let query: CallbackQuery = serde_json::from_value(serde_json::json!({
            "error": "access_denied",
            "error_description": "User cancelled"
        }))
        .unwrap();
        assert_eq!(query.error.as_deref(), Some("access_denied"));
        assert!(query.code.is_none());
    }
}
