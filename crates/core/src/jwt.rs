//! JWT token generation, validation, and claims.
//!
//! Centralizes all JWT handling with a shared validator for encoding and decoding.
//! Uses a pre-compiled validator with cached keys.
//!
//! This module is database-agnostic: implement `JwtSubject` for your user type.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::{AppError, UserRole};

/// JWT issuer identifier.
const ISSUER: &str = "signage-service";
/// JWT audience identifier.
const AUDIENCE: &str = "signage-admin";
/// Length of opaque tokens in bytes (256 bits of entropy).
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Trait for types that can be used as JWT subjects.
pub trait JwtSubject {
    fn user_id(&self) -> i32;
    fn email(&self) -> &str;
    fn role(&self) -> UserRole;
    fn organization_id(&self) -> Option<i32>;
}

/// Validated authentication info from JWT.
///
/// Single source of truth for auth context across middleware and handlers.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: i32,
    pub email: String,
    pub role: UserRole,
    pub organization_id: Option<i32>,
}

impl AuthInfo {
    #[inline]
    #[must_use]
    pub const fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }

    /// Admin or super admin.
    #[inline]
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::SuperAdmin | UserRole::Admin)
    }

    /// Check whether the caller may touch a resource owned by `org`.
    ///
    /// Super admins cross tenant boundaries; everyone else must match exactly.
    #[inline]
    #[must_use]
    pub fn can_access_org(&self, org: Option<i32>) -> bool {
        self.is_super_admin() || self.organization_id == org
    }

    /// Require tenant access, returning `PermissionDenied` otherwise.
    pub fn require_org(&self, org: Option<i32>, entity: &str) -> Result<(), AppError> {
        if self.can_access_org(org) {
            Ok(())
        } else {
            warn!(
                user_id = self.user_id,
                caller_org = ?self.organization_id,
                target_org = ?org,
                entity,
                "Cross-organization access denied"
            );
            Err(AppError::forbidden(format!(
                "No access to this {entity} of another organization"
            )))
        }
    }

    /// Organization filter for list queries (`None` means unrestricted).
    #[inline]
    #[must_use]
    pub const fn org_scope(&self) -> OrgScope {
        if self.is_super_admin() {
            OrgScope::All
        } else {
            OrgScope::Only(self.organization_id)
        }
    }
}

/// Tenant scope applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgScope {
    All,
    Only(Option<i32>),
}

impl OrgScope {
    /// Returns `(restricted, org_id)` for binding as SQL parameters.
    #[must_use]
    pub const fn as_params(self) -> (bool, Option<i32>) {
        match self {
            Self::All => (false, None),
            Self::Only(org) => (true, org),
        }
    }
}

/// JWT claims structure following RFC 7519.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,

    pub role: String,
    pub email: String,
    pub organization_id: Option<i32>,
}

/// JWT validation errors.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("invalid authorization format")]
    InvalidFormat,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid claim: {0}")]
    InvalidClaim(&'static str),
}

impl TryFrom<Claims> for AuthInfo {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims
                .sub
                .parse()
                .map_err(|_| JwtError::InvalidClaim("sub"))?,
            role: claims
                .role
                .parse()
                .map_err(|_| JwtError::InvalidClaim("role"))?,
            email: claims.email,
            organization_id: claims.organization_id,
        })
    }
}

/// Pre-compiled JWT validator with cached encoding/decoding keys.
///
/// Cloneable via `Arc`; keys are built once for the application lifetime.
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl JwtValidator {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret_bytes)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret_bytes)),
            validation,
        }
    }

    /// Generate an access token for any type implementing `JwtSubject`.
    pub fn generate_access_token<T: JwtSubject>(
        &self,
        subject: &T,
        ttl_minutes: u64,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let ttl = i64::try_from(ttl_minutes).unwrap_or(i64::MAX / 60);
        let expiration = now + Duration::minutes(ttl);

        let claims = Claims {
            sub: subject.user_id().to_string(),
            aud: AUDIENCE.to_string(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),

            role: subject.role().to_string(),
            email: subject.email().to_string(),
            organization_id: subject.organization_id(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("JWT encoding failed: {e}")))
    }

    /// Validate a JWT and extract auth info.
    pub fn validate(&self, token: &str) -> Result<AuthInfo, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| JwtError::InvalidToken)?;

        token_data.claims.try_into()
    }
}

/// Opaque token generator for refresh tokens and device tokens.
pub struct TokenGenerator;

impl TokenGenerator {
    /// Generate a random URL-safe base64 token.
    #[must_use]
    pub fn generate_secure_token() -> String {
        let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
    }

    /// Generate a refresh token and its expiry.
    #[must_use]
    pub fn generate_refresh_token(ttl_days: i64) -> (String, chrono::DateTime<Utc>) {
        let expires_at = Utc::now() + Duration::days(ttl_days);
        (Self::generate_secure_token(), expires_at)
    }

    /// SHA-256 of a token; only hashes are persisted.
    #[must_use]
    pub fn hash_token(token: &str) -> Vec<u8> {
        Sha256::digest(token.as_bytes()).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestUser {
        id: i32,
        email: String,
        role: UserRole,
        org: Option<i32>,
    }

    impl JwtSubject for TestUser {
        fn user_id(&self) -> i32 {
            self.id
        }
        fn email(&self) -> &str {
            &self.email
        }
        fn role(&self) -> UserRole {
            self.role
        }
        fn organization_id(&self) -> Option<i32> {
            self.org
        }
    }

    fn test_user() -> TestUser {
        TestUser {
            id: 17,
            email: "editor@example.com".to_string(),
            role: UserRole::Editor,
            org: Some(3),
        }
    }

    fn test_secret() -> SecretString {
        SecretString::from("test_secret_key_minimum_32_chars!")
    }

    fn auth(role: UserRole, org: Option<i32>) -> AuthInfo {
        AuthInfo {
            user_id: 1,
            email: "a@b.c".to_string(),
            role,
            organization_id: org,
        }
    }

    #[test]
    fn generate_and_validate_access_token() {
        let user = test_user();
        let validator = JwtValidator::new(&test_secret());

        let token = validator.generate_access_token(&user, 15).unwrap();
        let auth_info = validator.validate(&token).unwrap();

        assert_eq!(auth_info.user_id, 17);
        assert_eq!(auth_info.email, user.email);
        assert_eq!(auth_info.role, UserRole::Editor);
        assert_eq!(auth_info.organization_id, Some(3));
    }

    #[test]
    fn token_signed_with_other_secret_rejected() {
        let token = JwtValidator::new(&test_secret())
            .generate_access_token(&test_user(), 15)
            .unwrap();
        let other = JwtValidator::new(&SecretString::from("another_secret_key_also_32_chars!!"));
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn invalid_token_rejected() {
        let validator = JwtValidator::new(&test_secret());
        assert!(validator.validate("invalid.token.here").is_err());
    }

    #[test]
    fn secure_tokens_are_url_safe_and_unique() {
        let a = TokenGenerator::generate_secure_token();
        let b = TokenGenerator::generate_secure_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+') && !a.contains('/'));
    }

    #[test]
    fn refresh_token_expires_in_future() {
        let (token, expires_at) = TokenGenerator::generate_refresh_token(7);
        assert!(!token.is_empty());
        assert!(expires_at > Utc::now());
    }

    #[test]
    fn token_hash_is_stable() {
        assert_eq!(
            TokenGenerator::hash_token("abc"),
            TokenGenerator::hash_token("abc")
        );
        assert_eq!(TokenGenerator::hash_token("abc").len(), 32);
    }

    #[test]
    fn org_access_rules() {
        assert!(auth(UserRole::SuperAdmin, None).can_access_org(Some(9)));
        assert!(auth(UserRole::Admin, Some(2)).can_access_org(Some(2)));
        assert!(!auth(UserRole::Admin, Some(2)).can_access_org(Some(9)));
        assert!(auth(UserRole::Admin, Some(2)).require_org(None, "display").is_err());
    }

    #[test]
    fn org_scope_params() {
        assert_eq!(
            auth(UserRole::SuperAdmin, Some(1)).org_scope().as_params(),
            (false, None)
        );
        assert_eq!(
            auth(UserRole::Editor, Some(4)).org_scope().as_params(),
            (true, Some(4))
        );
    }
}
