//! JWT authentication middleware for the REST API.
//!
//! Validates Bearer tokens and injects `AuthInfo` into request extensions.
//! Device endpoints are public here; they authenticate with the device
//! token inside their handlers.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use http::{Request, Response, StatusCode};
use phf::phf_set;
use signage_core::{AuthInfo, JwtError, JwtValidator};
use tower::{Layer, Service};
use tracing::{Span, debug};

/// Public routes that bypass authentication.
static PUBLIC_ROUTES: phf::Set<&'static str> = phf_set! {
    // Infrastructure
    "/",
    "/health",
    "/health/live",
    "/health/ready",
    "/metrics",
    // Credential exchange
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/refresh",
    "/api/auth/logout",
    "/api/auth/ldap/login",
    // Azure AD flow
    "/api/auth/sso/status",
    "/api/auth/sso/login",
    "/api/auth/sso/callback",
    "/api/auth/sso/logout",
    // Device pairing (device token auth in handlers)
    "/api/devices/register",
    "/api/devices/verify",
    "/api/devices/status",
    "/api/devices/heartbeat",
    "/api/devices/content",
};

/// Path prefixes that bypass authentication.
const PUBLIC_PREFIXES: &[&str] = &["/api/public/", "/uploads/"];

/// Tower layer for JWT authentication.
#[derive(Clone)]
pub struct AuthLayer {
    validator: JwtValidator,
}

impl AuthLayer {
    #[must_use]
    pub const fn new(validator: JwtValidator) -> Self {
        Self { validator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            validator: self.validator.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    validator: JwtValidator,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AuthMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // CORS preflight
        if req.method() == http::Method::OPTIONS || is_public_route(req.uri().path()) {
            debug!(path = req.uri().path(), "Public route - skipping auth");
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        }

        match self.authenticate(&req) {
            Ok(auth_info) => {
                Span::current().record("user_id", auth_info.user_id);
                debug!(user_id = auth_info.user_id, role = %auth_info.role, "Authenticated");
                req.extensions_mut().insert(auth_info);
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Err(err) => Box::pin(async move { Ok(unauthorized(&err)) }),
        }
    }
}

impl<S> AuthMiddleware<S> {
    fn authenticate<T>(&self, req: &Request<T>) -> Result<AuthInfo, JwtError> {
        let token = bearer_token(req)?;
        self.validator.validate(token)
    }
}

/// Extract the Bearer token from the `Authorization` header.
pub fn bearer_token<T>(req: &Request<T>) -> Result<&str, JwtError> {
    bearer_from_headers(req.headers())
}

/// Header-map variant of [`bearer_token`] for extractors.
pub fn bearer_from_headers(headers: &http::HeaderMap) -> Result<&str, JwtError> {
    let header = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(JwtError::MissingHeader)?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(JwtError::InvalidFormat)
}

fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTES.contains(path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn unauthorized(err: &JwtError) -> Response<Body> {
    let body = serde_json::json!({ "success": false, "error": err.to_string() });
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        http::header::WWW_AUTHENTICATE,
        http::HeaderValue::from_static("Bearer"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn public_routes_identified_correctly() {
        assert!(is_public_route("/health"));
        assert!(is_public_route("/health/ready"));
        assert!(is_public_route("/metrics"));
        assert!(is_public_route("/"));
        assert!(is_public_route("/api/auth/login"));
        assert!(is_public_route("/api/auth/refresh"));
        assert!(is_public_route("/api/auth/sso/callback"));
        assert!(is_public_route("/api/devices/register"));
        assert!(is_public_route("/api/devices/content"));
        assert!(is_public_route("/api/public/displays/lobby/posts"));
        assert!(is_public_route("/uploads/abc.png"));
    }

    #[test]
    fn admin_routes_require_auth() {
        assert!(!is_public_route("/api/auth/me"));
        assert!(!is_public_route("/api/devices"));
        assert!(!is_public_route("/api/devices/4/authorize"));
        assert!(!is_public_route("/api/posts"));
        assert!(!is_public_route("/api/public"));
        assert!(!is_public_route("/api/system/cache"));
    }

    #[test]
    fn bearer_token_parsing() {
        let req = Request::builder()
            .header("authorization", "Bearer abc.def")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&req).unwrap(), "abc.def");

        let req = Request::builder()
            .header("authorization", "Basic xyz")
            .body(())
            .unwrap();
        assert!(matches!(bearer_token(&req), Err(JwtError::InvalidFormat)));

        let req = Request::builder().body(()).unwrap();
        assert!(matches!(bearer_token(&req), Err(JwtError::MissingHeader)));
    }

    #[test]
    fn invalid_jwt_is_rejected() {
        let validator = JwtValidator::new(&SecretString::from("test_secret_32_chars_minimum!!!!"));
        assert!(validator.validate("invalid.token.here").is_err());
    }

    #[test]
    fn unauthorized_response_is_json() {
        let response = unauthorized(&JwtError::InvalidToken);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(http::header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
