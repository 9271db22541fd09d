//! Azure AD authorization code flow with PKCE.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use signage_db::SsoProvider;
use tracing::{error, info, warn};
use url::Url;

use super::config::{AZURE_SCOPES, AzureAdConfig};
use super::{CallbackQuery, FederatedIdentity, LogoutResponse, SsoFailure, SsoService};
use crate::core::pkce;

/// Lifetime of a pending authorization request.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Admin UI page that reads the tokens from the URL fragment.
const CALLBACK_PAGE: &str = "sso-callback.html";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

/// Claims read from the ID token. The token comes straight from the token
/// endpoint over TLS, so its signature is not checked again; audience,
/// expiry and tenant are.
#[derive(Debug, Default, Deserialize)]
struct IdTokenClaims {
    tid: Option<String>,
    oid: Option<String>,
    preferred_username: Option<String>,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

impl SsoService {
    /// URL to send the browser to: the Azure authorize endpoint, or the admin
    /// login with an error code.
    pub async fn login_redirect(&self, redirect_to: Option<&str>) -> String {
        let sso = self.ctx.sso();
        if !sso.azure_enabled() || !sso.validate().is_empty() {
            warn!("Azure AD login requested but SSO is not configured");
            return self.error_redirect(SsoFailure::NotConfigured.code());
        }

        let verifier = pkce::generate_verifier();
        let state = pkce::generate_state();
        let redirect_to = redirect_to.filter(|r| is_local_path(r));

        if let Err(e) = self
            .ctx
            .db()
            .oauth_states
            .create(&state, &verifier, redirect_to, STATE_TTL)
            .await
        {
            error!(error = %e, "Failed to persist OAuth state");
            return self.error_redirect(SsoFailure::InitFailed.code());
        }

        match authorize_url(&sso.azure, &state, &pkce::challenge_s256(&verifier)) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Invalid Azure AD authorize URL");
                self.error_redirect(SsoFailure::InitFailed.code())
            }
        }
    }

    /// Finish the flow and return where to send the browser.
    pub async fn callback_redirect(&self, query: CallbackQuery) -> String {
        if let Some(provider_error) = query.error.as_deref() {
            let message = query
                .error_description
                .as_deref()
                .unwrap_or(provider_error);
            warn!(error = provider_error, "Azure AD returned an error");
            return format!(
                "{}?error=sso_denied&message={}",
                self.ctx.admin_url(),
                urlencoding::encode(message)
            );
        }

        match self.complete(query).await {
            Ok(url) => url,
            Err(failure) => {
                if let SsoFailure::Backend(e) = &failure {
                    error!(error = %e, "SSO callback failed");
                }
                self.error_redirect(failure.code())
            }
        }
    }

    async fn complete(&self, query: CallbackQuery) -> Result<String, SsoFailure> {
        let (Some(code), Some(state)) = (query.code, query.state) else {
            warn!("SSO callback without code or state");
            return Err(SsoFailure::InvalidResponse);
        };

        let Some(pending) = self.ctx.db().oauth_states.consume(&state).await? else {
            warn!("SSO callback with unknown or expired state");
            return Err(SsoFailure::StateExpired);
        };

        let claims = self.exchange_code(&code, &pending.code_verifier).await?;
        let identity = identity_from_claims(claims).ok_or(SsoFailure::NoEmail)?;

        let user = self.provision(&identity).await?;
        let tokens = self.ctx.create_session(&user).await?;
        info!(user_id = user.id, provider = "azure_ad", "SSO login successful");

        let mut target = format!(
            "{}/{CALLBACK_PAGE}#token={}&refreshToken={}",
            self.ctx.admin_url(),
            urlencoding::encode(&tokens.access_token),
            urlencoding::encode(&tokens.refresh_token),
        );
        if let Some(redirect) = pending.redirect_to.as_deref() {
            target.push_str("&redirect=");
            target.push_str(&urlencoding::encode(redirect));
        }
        Ok(target)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<IdTokenClaims, SsoFailure> {
        let azure = &self.ctx.sso().azure;
        let client_secret = azure
            .client_secret
            .as_ref()
            .map(|s| s.expose_secret().to_string())
            .unwrap_or_default();

        let form = [
            ("client_id", azure.client_id.as_deref().unwrap_or_default()),
            ("client_secret", client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", azure.redirect_uri.as_str()),
            ("code_verifier", verifier),
            ("scope", AZURE_SCOPES),
        ];

        let response = self
            .ctx
            .http()
            .post(azure.token_endpoint())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Azure AD token request failed");
                SsoFailure::TokenFailed
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Azure AD rejected the authorization code");
            return Err(SsoFailure::TokenFailed);
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Unreadable Azure AD token response");
            SsoFailure::TokenFailed
        })?;

        tokens
            .id_token
            .as_deref()
            .and_then(|token| decode_claims(token, azure))
            .ok_or(SsoFailure::TokenFailed)
    }

    /// Where the browser goes after signing out.
    #[must_use]
    pub fn logout_target(&self) -> LogoutResponse {
        let sso = self.ctx.sso();
        let logout_url = if sso.azure_enabled() {
            format!(
                "{}?post_logout_redirect_uri={}",
                sso.azure.logout_endpoint(),
                urlencoding::encode(&sso.azure.post_logout_uri)
            )
        } else {
            self.ctx.admin_url().to_string()
        };
        LogoutResponse { logout_url }
    }

    fn error_redirect(&self, code: &str) -> String {
        format!("{}?error={code}", self.ctx.admin_url())
    }
}

fn authorize_url(
    azure: &AzureAdConfig,
    state: &str,
    challenge: &str,
) -> Result<String, url::ParseError> {
    let mut url = Url::parse(&azure.authorize_endpoint())?;
    url.query_pairs_mut()
        .append_pair("client_id", azure.client_id.as_deref().unwrap_or_default())
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &azure.redirect_uri)
        .append_pair("response_mode", "query")
        .append_pair("scope", AZURE_SCOPES)
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("prompt", "select_account");
    Ok(url.into())
}

/// Claims of an ID token issued to this application by the configured tenant.
fn decode_claims(id_token: &str, azure: &AzureAdConfig) -> Option<IdTokenClaims> {
    let client_id = azure.client_id.as_deref()?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.set_audience(&[client_id]);
    validation.set_required_spec_claims(&["exp", "aud"]);

    let claims = decode::<IdTokenClaims>(id_token, &DecodingKey::from_secret(&[]), &validation)
        .inspect_err(|e| warn!(error = %e, "Rejected Azure AD ID token"))
        .ok()?
        .claims;

    if let Some(tenant) = azure.tenant_id.as_deref()
        && claims.tid.as_deref() != Some(tenant)
    {
        warn!(tid = ?claims.tid, "ID token issued by another tenant");
        return None;
    }
    Some(claims)
}

fn identity_from_claims(claims: IdTokenClaims) -> Option<FederatedIdentity> {
    let email = claims
        .preferred_username
        .or(claims.email)
        .filter(|e| e.contains('@'))?;

    let mut identity = FederatedIdentity::new(&email, SsoProvider::AzureAd);
    identity.first_name = claims.given_name;
    identity.last_name = claims.family_name;
    identity.external_id = claims.oid;
    Some(identity)
}

/// Only same-origin paths are accepted as post-login targets.
///
/// Browsers read `\` as `/`, so `/\host` would escape to another origin.
fn is_local_path(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/' | '\\'))
        && !path.contains('\\')
        && !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sso::config::tests::azure_config;

    /// An ID token for the test tenant and client, merged with `extra`.
    fn token_with(extra: &serde_json::Value) -> String {
        let mut claims = serde_json::json!({
            "aud": "client-abcdef-123456",
            "tid": "contoso-tenant-0001",
            "exp": chrono::Utc::now().timestamp() + 600,
        });
        if let (Some(claims), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
            claims.extend(extra.clone());
        }
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"unrelated-key"),
        )
        .unwrap()
    }

    fn claims_of(token: &str) -> Option<IdTokenClaims> {
        decode_claims(token, &azure_config().azure)
    }

    #[test]
    fn authorize_url_carries_pkce_parameters() {
        let config = azure_config();
        let url = authorize_url(&config.azure, "state-1", "challenge-1").unwrap();
        let parsed = Url::parse(&url).unwrap();

        assert_eq!(
            parsed.path(),
            "/contoso-tenant-0001/oauth2/v2.0/authorize"
        );
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-abcdef-123456");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["state"], "state-1");
        assert_eq!(pairs["code_challenge"], "challenge-1");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["scope"], AZURE_SCOPES);
        assert_eq!(pairs["prompt"], "select_account");
    }

    #[test]
    fn claims_are_read_from_the_payload() {
        let token = token_with(&serde_json::json!({
            "oid": "0000-1111",
            "preferred_username": "Jane@Example.com",
            "given_name": "Jane",
            "family_name": "Doe"
        }));
        let identity = identity_from_claims(claims_of(&token).unwrap()).unwrap();

        assert_eq!(identity.email, "jane@example.com");
        assert_eq!(identity.external_id.as_deref(), Some("0000-1111"));
        assert_eq!(identity.first_name.as_deref(), Some("Jane"));
        assert_eq!(identity.provider, SsoProvider::AzureAd);
    }

    #[test]
    fn email_claim_is_a_fallback() {
        let token = token_with(&serde_json::json!({ "email": "ops@example.com" }));
        let identity = identity_from_claims(claims_of(&token).unwrap()).unwrap();
        assert_eq!(identity.email, "ops@example.com");
    }

    #[test]
    fn claims_without_email_are_rejected() {
        let token = token_with(&serde_json::json!({ "oid": "x", "preferred_username": "jane" }));
        assert!(identity_from_claims(claims_of(&token).unwrap()).is_none());
    }

    #[test]
    fn malformed_tokens_decode_to_none() {
        assert!(claims_of("not-a-jwt").is_none());
        assert!(claims_of("a.!!!.c").is_none());
    }

    #[test]
    fn tokens_for_another_client_are_rejected() {
        let token = token_with(&serde_json::json!({
            "aud": "someone-else",
            "email": "ops@example.com"
        }));
        assert!(claims_of(&token).is_none());
    }

    #[test]
    fn tokens_from_another_tenant_are_rejected() {
        let token = token_with(&serde_json::json!({
            "tid": "fabrikam-tenant",
            "email": "ops@example.com"
        }));
        assert!(claims_of(&token).is_none());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = token_with(&serde_json::json!({
            "exp": chrono::Utc::now().timestamp() - 3600,
            "email": "ops@example.com"
        }));
        assert!(claims_of(&token).is_none());
    }

    #[test]
    fn only_local_paths_are_redirect_targets() {
        assert!(is_local_path("/admin/posts"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("/\\evil.example"));
        assert!(!is_local_path("/admin\\..\\\\evil.example"));
        assert!(!is_local_path("https://evil.example"));
        assert!(!is_local_path("admin"));
    }
}
