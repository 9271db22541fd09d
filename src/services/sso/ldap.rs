//! LDAP / Active Directory login.
//!
//! A service account searches for the user, then a second connection binds
//! as the found DN with the supplied password.

use std::collections::HashMap;
use std::time::Duration;

use ldap3::{LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, ldap_escape};
use secrecy::ExposeSecret;
use serde::Serialize;
use signage_core::{AppError, AuthInfo, UserRole, permissions as perm};
use signage_db::SsoProvider;
use tracing::{info, warn};

use super::config::LdapConfig;
use super::{FederatedIdentity, LdapLoginRequest, SsoService};
use crate::services::auth::AuthResponse;
use crate::services::permissions::require_permission;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Result code for a failed simple bind.
const INVALID_CREDENTIALS_RC: u32 = 49;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Directory entry of an authenticated user.
#[derive(Debug, Clone)]
struct DirectoryUser {
    dn: String,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    groups: Vec<String>,
}

/// Outcome of the admin connection test.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    pub server: String,
    #[serde(rename = "baseDN")]
    pub base_dn: Option<String>,
    #[serde(rename = "bindDN")]
    pub bind_dn: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub server_info: HashMap<String, Vec<String>>,
}

impl SsoService {
    pub async fn ldap_login(&self, req: LdapLoginRequest) -> Result<AuthResponse, AppError> {
        let username = req.username.trim();
        if username.is_empty() || req.password.is_empty() {
            return Err(AppError::invalid("Username and password are required"));
        }

        let sso = self.ctx.sso();
        if !sso.ldap_enabled() {
            return Err(AppError::invalid("LDAP authentication is not enabled"));
        }

        let entry = authenticate(&sso.ldap, username, &req.password).await?;

        let mut identity = FederatedIdentity::new(&entry.email, SsoProvider::Ldap);
        identity.first_name = entry.first_name;
        identity.last_name = entry.last_name;
        identity.role = determine_role(&sso.ldap, &entry.groups);
        identity.external_id = Some(entry.dn);

        let user = self.provision(&identity).await?;
        let tokens = self.ctx.create_session(&user).await?;
        info!(user_id = user.id, username = %entry.username, "LDAP login successful");

        Ok(AuthResponse { user, tokens })
    }

    /// Bind with the service account and read the root DSE.
    pub async fn ldap_test(&self, auth: &AuthInfo) -> Result<ConnectionReport, AppError> {
        require_permission(&self.ctx, auth, &[perm::SYSTEM_SETTINGS, perm::SETTINGS_WRITE]).await?;

        let config = &self.ctx.sso().ldap;
        let mut report = ConnectionReport {
            success: false,
            message: String::new(),
            server: config.url.clone(),
            base_dn: config.base_dn.clone(),
            bind_dn: config.bind_dn.clone(),
            server_info: HashMap::new(),
        };

        match read_root_dse(config).await {
            Ok(info) => {
                report.success = true;
                report.message = "LDAP connection successful".to_string();
                report.server_info = info;
            }
            Err(e) => {
                warn!(server = %config.url, error = %e, "LDAP connection test failed");
                report.message = e.to_string();
            }
        }
        info!(by = auth.user_id, success = report.success, "LDAP connection tested");
        Ok(report)
    }
}

fn settings(config: &LdapConfig) -> LdapConnSettings {
    LdapConnSettings::new()
        .set_conn_timeout(CONNECT_TIMEOUT)
        .set_no_tls_verify(!config.tls_reject_unauthorized)
}

fn service_credentials(config: &LdapConfig) -> (&str, &str) {
    (
        config.bind_dn.as_deref().unwrap_or_default(),
        config
            .bind_password
            .as_ref()
            .map_or("", |p| p.expose_secret()),
    )
}

async fn authenticate(
    config: &LdapConfig,
    username: &str,
    password: &str,
) -> Result<DirectoryUser, AppError> {
    let entry = find_user(config, username).await.map_err(unavailable)?;
    let Some(entry) = entry else {
        warn!(username, "LDAP user not found");
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
    };

    let (conn, mut ldap) = LdapConnAsync::with_settings(settings(config), &config.url)
        .await
        .map_err(unavailable)?;
    ldap3::drive!(conn);

    let bound = ldap.simple_bind(&entry.dn, password).await.and_then(|r| r.success());
    let _ = ldap.unbind().await;
    match bound {
        Ok(_) => {}
        Err(LdapError::LdapResult { result }) if result.rc == INVALID_CREDENTIALS_RC => {
            warn!(username, "LDAP bind failed: invalid password");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }
        Err(e) => return Err(unavailable(e)),
    }

    Ok(directory_user(config, username, entry))
}

/// Search as the service account. `None` when nothing matches.
async fn find_user(config: &LdapConfig, username: &str) -> Result<Option<SearchEntry>, LdapError> {
    let (conn, mut ldap) = LdapConnAsync::with_settings(settings(config), &config.url).await?;
    ldap3::drive!(conn);

    let (bind_dn, bind_password) = service_credentials(config);
    ldap.simple_bind(bind_dn, bind_password).await?.success()?;

    let filter = user_filter(&config.user_search_filter, username);
    let base = config
        .user_search_base
        .as_deref()
        .or(config.base_dn.as_deref())
        .unwrap_or_default();
    let attributes = vec![
        config.username_attribute.as_str(),
        config.email_attribute.as_str(),
        config.first_name_attribute.as_str(),
        config.last_name_attribute.as_str(),
        "distinguishedName",
        "memberOf",
    ];

    let (entries, _) = ldap
        .search(base, Scope::Subtree, &filter, attributes)
        .await?
        .success()?;
    ldap.unbind().await?;

    Ok(entries.into_iter().next().map(SearchEntry::construct))
}

async fn read_root_dse(config: &LdapConfig) -> Result<HashMap<String, Vec<String>>, LdapError> {
    let (conn, mut ldap) = LdapConnAsync::with_settings(settings(config), &config.url).await?;
    ldap3::drive!(conn);

    let (bind_dn, bind_password) = service_credentials(config);
    ldap.simple_bind(bind_dn, bind_password).await?.success()?;

    let (entries, _) = ldap
        .search(
            "",
            Scope::Base,
            "(objectClass=*)",
            vec!["namingContexts", "defaultNamingContext", "rootDomainNamingContext"],
        )
        .await?
        .success()?;
    ldap.unbind().await?;

    Ok(entries
        .into_iter()
        .next()
        .map(|e| SearchEntry::construct(e).attrs)
        .unwrap_or_default())
}

fn unavailable(e: LdapError) -> AppError {
    warn!(error = %e, "LDAP directory error");
    AppError::Unavailable(format!("LDAP directory error: {e}"))
}

fn user_filter(template: &str, username: &str) -> String {
    template.replace("{{username}}", &ldap_escape(username))
}

fn directory_user(config: &LdapConfig, username: &str, entry: SearchEntry) -> DirectoryUser {
    let attr = |name: &str| first_value(&entry.attrs, name);
    let email = attr(&config.email_attribute).unwrap_or_else(|| {
        format!(
            "{username}@{}",
            domain_from_base_dn(config.base_dn.as_deref().unwrap_or_default())
        )
    });

    DirectoryUser {
        username: attr(&config.username_attribute).unwrap_or_else(|| username.to_string()),
        email,
        first_name: attr(&config.first_name_attribute),
        last_name: attr(&config.last_name_attribute),
        groups: all_values(&entry.attrs, "memberOf"),
        dn: entry.dn,
    }
}

/// Attribute names are case-insensitive in LDAP.
fn all_values(attrs: &HashMap<String, Vec<String>>, name: &str) -> Vec<String> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

fn first_value(attrs: &HashMap<String, Vec<String>>, name: &str) -> Option<String> {
    all_values(attrs, name)
        .into_iter()
        .find(|v| !v.trim().is_empty())
}

/// `CN=Signage Admins,OU=Groups,DC=corp` → `Signage Admins`. Plain names pass through.
fn extract_cn(dn: &str) -> &str {
    dn.split(',')
        .next()
        .and_then(|rdn| {
            let (key, value) = rdn.split_once('=')?;
            key.trim().eq_ignore_ascii_case("CN").then(|| value.trim())
        })
        .unwrap_or(dn)
}

/// Admin group wins over editor group. `None` when neither matches.
fn determine_role(config: &LdapConfig, groups: &[String]) -> Option<UserRole> {
    let member_of = |group: Option<&str>| {
        group.is_some_and(|group| {
            let wanted = extract_cn(group);
            groups
                .iter()
                .any(|g| extract_cn(g).eq_ignore_ascii_case(wanted))
        })
    };

    if member_of(config.admin_group.as_deref()) {
        Some(UserRole::Admin)
    } else if member_of(config.editor_group.as_deref()) {
        Some(UserRole::Editor)
    } else {
        None
    }
}

/// `DC=corp,DC=example,DC=com` → `corp.example.com`, `local` without DC parts.
fn domain_from_base_dn(base_dn: &str) -> String {
    let parts: Vec<&str> = base_dn
        .split(',')
        .filter_map(|rdn| {
            let (key, value) = rdn.split_once('=')?;
            key.trim().eq_ignore_ascii_case("DC").then(|| value.trim())
        })
        .collect();
    if parts.is_empty() {
        "local".to_string()
    } else {
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sso::SsoConfig;

    fn ldap_config() -> LdapConfig {
        let mut config = SsoConfig::disabled().ldap;
        config.base_dn = Some("DC=corp,DC=example,DC=com".to_string());
        config.admin_group =
            Some("CN=Signage Admins,OU=Groups,DC=corp,DC=example,DC=com".to_string());
        config.editor_group = Some("Signage Editors".to_string());
        config
    }

    #[test]
    fn filter_escapes_special_characters() {
        assert_eq!(
            user_filter("(sAMAccountName={{username}})", "a*b(c)\\d\0"),
            "(sAMAccountName=a\\2ab\\28c\\29\\5cd\\00)"
        );
        assert_eq!(user_filter("(uid={{username}})", "jdoe"), "(uid=jdoe)");
    }

    #[test]
    fn cn_is_extracted_from_dn() {
        assert_eq!(extract_cn("CN=Signage Admins,OU=Groups,DC=corp"), "Signage Admins");
        assert_eq!(extract_cn("cn=editors,dc=corp"), "editors");
        assert_eq!(extract_cn("Signage Editors"), "Signage Editors");
        assert_eq!(extract_cn("OU=Groups,DC=corp"), "OU=Groups,DC=corp");
    }

    #[test]
    fn admin_group_takes_precedence() {
        let config = ldap_config();
        let groups = vec![
            "CN=signage editors,OU=Groups,DC=corp".to_string(),
            "CN=SIGNAGE ADMINS,OU=Other,DC=corp".to_string(),
        ];
        assert_eq!(determine_role(&config, &groups), Some(UserRole::Admin));
    }

    #[test]
    fn editor_group_maps_to_editor() {
        let groups = vec!["CN=Signage Editors,OU=Groups,DC=corp".to_string()];
        assert_eq!(determine_role(&ldap_config(), &groups), Some(UserRole::Editor));
    }

    #[test]
    fn no_matching_group_leaves_role_open() {
        let groups = vec!["CN=Everyone,DC=corp".to_string()];
        assert_eq!(determine_role(&ldap_config(), &groups), None);
        assert_eq!(determine_role(&ldap_config(), &[]), None);
    }

    #[test]
    fn domain_is_built_from_dc_parts() {
        assert_eq!(domain_from_base_dn("DC=corp,DC=example,DC=com"), "corp.example.com");
        assert_eq!(domain_from_base_dn("OU=Users, dc=acme ,dc=local"), "acme.local");
        assert_eq!(domain_from_base_dn(""), "local");
    }

    #[test]
    fn directory_user_falls_back_to_derived_email() {
        let config = ldap_config();
        let entry = SearchEntry {
            dn: "CN=Jane Doe,CN=Users,DC=corp,DC=example,DC=com".to_string(),
            attrs: HashMap::from([
                ("givenname".to_string(), vec!["Jane".to_string()]),
                ("memberOf".to_string(), vec!["CN=Signage Editors".to_string()]),
            ]),
            bin_attrs: HashMap::new(),
        };

        let user = directory_user(&config, "jdoe", entry);
        assert_eq!(user.email, "jdoe@corp.example.com");
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.first_name.as_deref(), Some("Jane"));
        assert_eq!(user.last_name, None);
        assert_eq!(user.groups, ["CN=Signage Editors"]);
    }
}
