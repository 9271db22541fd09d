//! Shared service context for all REST services.
//!
//! Provides common infrastructure (database, JWT keys, cache, uploads, SSO
//! settings) used by multiple services.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use signage_core::{AppError, JwtValidator, TokenGenerator};
use signage_db::{Database, User};
use tracing::debug;

use super::TtlCache;
use crate::services::sso::SsoConfig;

/// Access/refresh token pair returned on login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Token lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access_minutes: u64,
    pub refresh_days: i64,
}

/// Where uploaded files live and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Shared infrastructure context for all services.
///
/// Services hold `Arc<ServiceContext>` to share this efficiently.
pub struct ServiceContext {
    db: Database,
    jwt: JwtValidator,
    ttl: TokenTtl,
    cache: TtlCache,
    max_licensed_displays: u32,
    uploads: UploadSettings,
    sso: Arc<SsoConfig>,
    admin_url: String,
    http: reqwest::Client,
}

impl ServiceContext {
    #[must_use]
    #[expect(clippy::too_many_arguments, reason = "one-time wiring at startup")]
    pub fn new(
        db: Database,
        jwt: JwtValidator,
        ttl: TokenTtl,
        cache: TtlCache,
        max_licensed_displays: u32,
        uploads: UploadSettings,
        sso: SsoConfig,
        admin_url: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            db,
            jwt,
            ttl,
            cache,
            max_licensed_displays,
            uploads,
            sso: Arc::new(sso),
            admin_url: admin_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    #[inline]
    #[must_use]
    pub const fn db(&self) -> &Database {
        &self.db
    }

    #[inline]
    #[must_use]
    pub const fn cache(&self) -> &TtlCache {
        &self.cache
    }

    #[inline]
    #[must_use]
    pub const fn uploads(&self) -> &UploadSettings {
        &self.uploads
    }

    #[inline]
    #[must_use]
    pub fn sso(&self) -> &SsoConfig {
        &self.sso
    }

    /// Admin UI base path without a trailing slash.
    #[inline]
    #[must_use]
    pub fn admin_url(&self) -> &str {
        &self.admin_url
    }

    #[inline]
    #[must_use]
    pub const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Licence cap for an organization (`None` for unscoped resources).
    #[must_use]
    pub fn licence_cap(&self, org_max_displays: Option<i32>) -> i64 {
        licence_cap(self.max_licensed_displays, org_max_displays)
    }

    /// Issue an access token and persist a new refresh session.
    pub async fn create_session(&self, user: &User) -> Result<TokenPair, AppError> {
        let access_token = self.jwt.generate_access_token(user, self.ttl.access_minutes)?;

        let (refresh_token, expires_at) =
            TokenGenerator::generate_refresh_token(self.ttl.refresh_days);
        let hash = TokenGenerator::hash_token(&refresh_token);

        self.db.sessions.create(user.id, &hash, expires_at).await?;
        debug!(user_id = user.id, "Session created");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.ttl.access_minutes * 60,
        })
    }

    /// Drop cached public responses under each prefix.
    pub async fn invalidate(&self, prefixes: &[&str]) {
        for prefix in prefixes {
            self.cache.del_prefix(prefix).await;
        }
    }
}

/// The global limit, lowered by the organization's own `max_displays` when set.
#[must_use]
pub fn licence_cap(global: u32, org_max_displays: Option<i32>) -> i64 {
    let global = i64::from(global);
    org_max_displays
        .filter(|m| *m > 0)
        .map_or(global, |m| global.min(i64::from(m)))
}

/// Cache keys and lifetimes of the public read API.
pub mod cache_keys {
    use super::Duration;

    pub const DISPLAYS_LIST: &str = "public:displays:list";
    pub const DISPLAYS_LIST_TTL: Duration = Duration::from_secs(60);
    pub const DISPLAY_PREFIX: &str = "public:display";
    pub const DISPLAY_POSTS_TTL: Duration = Duration::from_secs(30);
    pub const POSTS_PREFIX: &str = "public:posts:";
    pub const POSTS_TTL: Duration = Duration::from_secs(30);
    pub const SETTINGS_PREFIX: &str = "public:settings";
    pub const SETTINGS_TTL: Duration = Duration::from_secs(60);
    pub const PUBLIC_PREFIX: &str = "public:";

    #[must_use]
    pub fn display_posts(identifier: &str) -> String {
        format!("{DISPLAY_PREFIX}:{identifier}:posts")
    }

    #[must_use]
    pub fn settings(category: Option<&str>) -> String {
        format!("{SETTINGS_PREFIX}:{}", category.unwrap_or("all"))
    }

    #[must_use]
    pub fn active_posts(organization: Option<&str>, category: Option<i32>) -> String {
        let category = category.map_or_else(|| "all".to_string(), |c| c.to_string());
        format!("{POSTS_PREFIX}{}:{category}", organization.unwrap_or("all"))
    }
}

#[cfg(test)]
mod tests {
    use super::{cache_keys, licence_cap};

    #[test]
    fn licence_cap_takes_the_lower_limit() {
        assert_eq!(licence_cap(2, None), 2);
        assert_eq!(licence_cap(2, Some(10)), 2);
        assert_eq!(licence_cap(20, Some(5)), 5);
        assert_eq!(licence_cap(3, Some(0)), 3);
    }

    #[test]
    fn display_posts_key_falls_under_display_prefix() {
        let key = cache_keys::display_posts("lobby");
        assert_eq!(key, "public:display:lobby:posts");
        assert!(key.starts_with(cache_keys::DISPLAY_PREFIX));
        // display writes also drop the public display list
        assert!(cache_keys::DISPLAYS_LIST.starts_with(cache_keys::DISPLAY_PREFIX));
    }

    #[test]
    fn active_posts_key_defaults_to_all() {
        assert_eq!(cache_keys::active_posts(None, None), "public:posts:all:all");
        assert_eq!(
            cache_keys::active_posts(Some("acme"), Some(4)),
            "public:posts:acme:4"
        );
    }
}
