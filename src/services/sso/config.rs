//! SSO settings (Azure AD or LDAP), read from the environment.

use clap::{Args, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use signage_core::UserRole;

/// OAuth scopes requested from Azure AD.
pub const AZURE_SCOPES: &str = "openid profile email User.Read";

const AZURE_LOGIN_HOST: &str = "https://login.microsoftonline.com";

/// Federated login provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SsoProviderKind {
    #[value(name = "azure_ad")]
    AzureAd,
    Ldap,
    /// Accepted in configuration, not supported at login.
    Adfs,
    #[default]
    None,
}

impl SsoProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AzureAd => "azure_ad",
            Self::Ldap => "ldap",
            Self::Adfs => "adfs",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SsoConfig {
    /// Enable federated login
    #[arg(
        id = "sso_enabled",
        long = "sso-enabled",
        env = "SSO_ENABLED",
        default_value = "false",
        action = clap::ArgAction::Set
    )]
    pub enabled: bool,

    /// Provider: azure_ad, ldap, adfs or none
    #[arg(long = "sso-provider", env = "SSO_PROVIDER", value_enum, default_value = "none")]
    pub provider: SsoProviderKind,

    /// Create unknown users on their first federated login
    #[arg(
        long = "sso-auto-create-users",
        env = "SSO_AUTO_CREATE_USERS",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub auto_create_users: bool,

    /// Role given to auto-created users
    #[arg(long = "sso-default-role", env = "SSO_DEFAULT_ROLE", default_value = "editor")]
    pub default_role: UserRole,

    /// Comma-separated e-mail domains allowed to sign in (empty = any)
    #[arg(long = "sso-allowed-domains", env = "SSO_ALLOWED_DOMAINS")]
    pub allowed_domains: Option<String>,

    #[command(flatten)]
    pub azure: AzureAdConfig,

    #[command(flatten)]
    pub ldap: LdapConfig,
}

#[derive(Debug, Clone, Args)]
pub struct AzureAdConfig {
    #[arg(long = "azure-ad-tenant-id", env = "AZURE_AD_TENANT_ID")]
    pub tenant_id: Option<String>,

    #[arg(long = "azure-ad-client-id", env = "AZURE_AD_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long = "azure-ad-client-secret", env = "AZURE_AD_CLIENT_SECRET")]
    pub client_secret: Option<SecretString>,

    #[arg(
        long = "azure-ad-redirect-uri",
        env = "AZURE_AD_REDIRECT_URI",
        default_value = "http://localhost:3000/api/auth/sso/callback"
    )]
    pub redirect_uri: String,

    #[arg(
        long = "azure-ad-post-logout-uri",
        env = "AZURE_AD_POST_LOGOUT_URI",
        default_value = "http://localhost:3000/admin"
    )]
    pub post_logout_uri: String,
}

impl AzureAdConfig {
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{AZURE_LOGIN_HOST}/{}/oauth2/v2.0/{path}",
            self.tenant_id.as_deref().unwrap_or("common")
        )
    }

    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        self.endpoint("authorize")
    }

    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.endpoint("token")
    }

    #[must_use]
    pub fn logout_endpoint(&self) -> String {
        self.endpoint("logout")
    }
}

#[derive(Debug, Clone, Args)]
pub struct LdapConfig {
    #[arg(long = "ldap-url", env = "LDAP_URL", default_value = "ldap://localhost:389")]
    pub url: String,

    /// Base DN, e.g. DC=example,DC=local
    #[arg(long = "ldap-base-dn", env = "LDAP_BASE_DN")]
    pub base_dn: Option<String>,

    /// Service account used for user searches
    #[arg(long = "ldap-bind-dn", env = "LDAP_BIND_DN")]
    pub bind_dn: Option<String>,

    #[arg(long = "ldap-bind-password", env = "LDAP_BIND_PASSWORD")]
    pub bind_password: Option<SecretString>,

    #[arg(long = "ldap-user-search-base", env = "LDAP_USER_SEARCH_BASE")]
    pub user_search_base: Option<String>,

    /// Search filter; `{{username}}` is replaced by the escaped login name
    #[arg(
        long = "ldap-user-search-filter",
        env = "LDAP_USER_SEARCH_FILTER",
        default_value = "(sAMAccountName={{username}})"
    )]
    pub user_search_filter: String,

    #[arg(
        long = "ldap-username-attribute",
        env = "LDAP_USERNAME_ATTRIBUTE",
        default_value = "sAMAccountName"
    )]
    pub username_attribute: String,

    #[arg(long = "ldap-email-attribute", env = "LDAP_EMAIL_ATTRIBUTE", default_value = "mail")]
    pub email_attribute: String,

    #[arg(
        long = "ldap-firstname-attribute",
        env = "LDAP_FIRSTNAME_ATTRIBUTE",
        default_value = "givenName"
    )]
    pub first_name_attribute: String,

    #[arg(long = "ldap-lastname-attribute", env = "LDAP_LASTNAME_ATTRIBUTE", default_value = "sn")]
    pub last_name_attribute: String,

    /// Group DN or CN whose members become admins
    #[arg(long = "ldap-admin-group", env = "LDAP_ADMIN_GROUP")]
    pub admin_group: Option<String>,

    /// Group DN or CN whose members become editors
    #[arg(long = "ldap-editor-group", env = "LDAP_EDITOR_GROUP")]
    pub editor_group: Option<String>,

    /// Verify the server certificate on ldaps:// and StartTLS
    #[arg(
        long = "ldap-tls-reject-unauthorized",
        env = "LDAP_TLS_REJECT_UNAUTHORIZED",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub tls_reject_unauthorized: bool,
}

impl SsoConfig {
    /// Lowercased, trimmed allow-list of e-mail domains. Empty allows any.
    #[must_use]
    pub fn allowed_domains(&self) -> Vec<String> {
        self.allowed_domains
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// Whether `email` belongs to an allowed domain.
    #[must_use]
    pub fn is_domain_allowed(&self, email: &str) -> bool {
        let allowed = self.allowed_domains();
        if allowed.is_empty() {
            return true;
        }
        email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| allowed.iter().any(|d| d.eq_ignore_ascii_case(domain)))
    }

    #[inline]
    #[must_use]
    pub fn azure_enabled(&self) -> bool {
        self.enabled && self.provider == SsoProviderKind::AzureAd
    }

    #[inline]
    #[must_use]
    pub fn ldap_enabled(&self) -> bool {
        self.enabled && self.provider == SsoProviderKind::Ldap
    }

    /// Settings the selected provider still needs. Empty when disabled.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }

        let missing = |name: &str, present: bool| (!present).then(|| format!("{name} is required"));
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let secret_set = |v: &Option<SecretString>| {
            v.as_ref().is_some_and(|s| !s.expose_secret().trim().is_empty())
        };

        let checks = match self.provider {
            SsoProviderKind::AzureAd => vec![
                missing("AZURE_AD_TENANT_ID", set(&self.azure.tenant_id)),
                missing("AZURE_AD_CLIENT_ID", set(&self.azure.client_id)),
                missing("AZURE_AD_CLIENT_SECRET", secret_set(&self.azure.client_secret)),
                missing("AZURE_AD_REDIRECT_URI", !self.azure.redirect_uri.is_empty()),
            ],
            SsoProviderKind::Ldap => vec![
                missing("LDAP_URL", !self.ldap.url.is_empty()),
                missing("LDAP_BASE_DN", set(&self.ldap.base_dn)),
                missing("LDAP_BIND_DN", set(&self.ldap.bind_dn)),
                missing("LDAP_BIND_PASSWORD", secret_set(&self.ldap.bind_password)),
                missing("LDAP_USER_SEARCH_BASE", set(&self.ldap.user_search_base)),
            ],
            SsoProviderKind::Adfs | SsoProviderKind::None => Vec::new(),
        };
        checks.into_iter().flatten().collect()
    }

    /// Effective configuration with secrets masked, for the admin UI.
    #[must_use]
    pub fn redacted(&self) -> SsoConfigView {
        let errors = self.validate();
        SsoConfigView {
            enabled: self.enabled,
            provider: self.provider,
            auto_create_users: self.auto_create_users,
            default_role: self.default_role,
            allowed_domains: self.allowed_domains(),
            azure_ad: AzureAdView {
                tenant_id: self.azure.tenant_id.as_deref().map(mask),
                client_id: self.azure.client_id.as_deref().map(mask),
                client_secret_set: self.azure.client_secret.is_some(),
                redirect_uri: self.azure.redirect_uri.clone(),
                post_logout_redirect_uri: self.azure.post_logout_uri.clone(),
                scopes: AZURE_SCOPES,
            },
            ldap: LdapView {
                url: self.ldap.url.clone(),
                base_dn: self.ldap.base_dn.clone(),
                bind_dn: self.ldap.bind_dn.clone(),
                bind_password_set: self.ldap.bind_password.is_some(),
                user_search_base: self.ldap.user_search_base.clone(),
                user_search_filter: self.ldap.user_search_filter.clone(),
                admin_group: self.ldap.admin_group.clone(),
                editor_group: self.ldap.editor_group.clone(),
            },
            valid: errors.is_empty(),
            errors,
        }
    }

    /// SSO switched off; used by tests and local setups.
    #[cfg(test)]
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            provider: SsoProviderKind::None,
            auto_create_users: true,
            default_role: UserRole::Editor,
            allowed_domains: None,
            azure: AzureAdConfig {
                tenant_id: None,
                client_id: None,
                client_secret: None,
                redirect_uri: "http://localhost:3000/api/auth/sso/callback".to_string(),
                post_logout_uri: "http://localhost:3000/admin".to_string(),
            },
            ldap: LdapConfig {
                url: "ldap://localhost:389".to_string(),
                base_dn: None,
                bind_dn: None,
                bind_password: None,
                user_search_base: None,
                user_search_filter: "(sAMAccountName={{username}})".to_string(),
                username_attribute: "sAMAccountName".to_string(),
                email_attribute: "mail".to_string(),
                first_name_attribute: "givenName".to_string(),
                last_name_attribute: "sn".to_string(),
                admin_group: None,
                editor_group: None,
                tls_reject_unauthorized: true,
            },
        }
    }
}

/// Keep the first and last four characters of an identifier.
fn mask(value: &str) -> String {
    const VISIBLE: usize = 4;
    const DOTS: &str = "********";

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= VISIBLE * 2 {
        return DOTS.to_string();
    }
    let head: String = chars[..VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE..].iter().collect();
    format!("{head}{DOTS}{tail}")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoConfigView {
    pub enabled: bool,
    pub provider: SsoProviderKind,
    pub auto_create_users: bool,
    pub default_role: UserRole,
    pub allowed_domains: Vec<String>,
    #[serde(rename = "azureAD")]
    pub azure_ad: AzureAdView,
    pub ldap: LdapView,
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAdView {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret_set: bool,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: String,
    pub scopes: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapView {
    pub url: String,
    #[serde(rename = "baseDN")]
    pub base_dn: Option<String>,
    #[serde(rename = "bindDN")]
    pub bind_dn: Option<String>,
    pub bind_password_set: bool,
    pub user_search_base: Option<String>,
    pub user_search_filter: String,
    pub admin_group: Option<String>,
    pub editor_group: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn azure_config() -> SsoConfig {
        let mut config = SsoConfig::disabled();
        config.enabled = true;
        config.provider = SsoProviderKind::AzureAd;
        config.azure.tenant_id = Some("contoso-tenant-0001".to_string());
        config.azure.client_id = Some("client-abcdef-123456".to_string());
        config.azure.client_secret = Some(SecretString::from("s3cr3t"));
        config
    }

    #[test]
    fn disabled_config_has_no_errors() {
        assert!(SsoConfig::disabled().validate().is_empty());
    }

    #[test]
    fn enabled_azure_reports_each_missing_setting() {
        let mut config = SsoConfig::disabled();
        config.enabled = true;
        config.provider = SsoProviderKind::AzureAd;
        let errors = config.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("AZURE_AD_TENANT_ID"));
        assert!(errors[2].contains("AZURE_AD_CLIENT_SECRET"));
        assert!(azure_config().validate().is_empty());
    }

    #[test]
    fn enabled_ldap_requires_directory_settings() {
        let mut config = SsoConfig::disabled();
        config.enabled = true;
        config.provider = SsoProviderKind::Ldap;
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("LDAP_BASE_DN")));
        assert!(errors.iter().any(|e| e.contains("LDAP_BIND_PASSWORD")));
        assert!(!errors.iter().any(|e| e.contains("LDAP_URL")));
    }

    #[test]
    fn allowed_domains_are_normalized() {
        let mut config = SsoConfig::disabled();
        config.allowed_domains = Some(" Example.com, ,corp.example.org ".to_string());
        assert_eq!(config.allowed_domains(), ["example.com", "corp.example.org"]);
        assert!(config.is_domain_allowed("jane@EXAMPLE.com"));
        assert!(!config.is_domain_allowed("jane@evil.com"));
        assert!(!config.is_domain_allowed("no-at-sign"));
    }

    #[test]
    fn empty_allow_list_accepts_any_domain() {
        assert!(SsoConfig::disabled().is_domain_allowed("anyone@anywhere.net"));
    }

    #[test]
    fn endpoints_use_the_tenant() {
        let config = azure_config();
        assert_eq!(
            config.azure.token_endpoint(),
            "https://login.microsoftonline.com/contoso-tenant-0001/oauth2/v2.0/token"
        );
        assert!(config.azure.logout_endpoint().ends_with("/oauth2/v2.0/logout"));
    }

    #[test]
    fn redacted_view_hides_secrets() {
        let view = azure_config().redacted();
        assert_eq!(view.azure_ad.tenant_id.as_deref(), Some("cont********0001"));
        assert!(view.azure_ad.client_secret_set);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("s3cr3t"));
        assert!(json.contains("\"azureAD\""));
        assert!(view.valid);
    }

    #[test]
    fn short_values_are_fully_masked() {
        assert_eq!(mask("abc"), "********");
        assert_eq!(mask("12345678"), "********");
    }
}
