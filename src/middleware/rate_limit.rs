//! Per-client rate limits, keyed by client IP.
//!
//! Three pools: credential exchange, media uploads and the authenticated
//! admin API. Each allows `max` requests per `window`, refilled evenly.
//! Rejections are `429` with the standard error envelope.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::response::{IntoResponse, Response};
use clap::Args;
use http::{StatusCode, header};
use signage_core::AppError;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tracing::warn;

/// Rate limit settings.
#[derive(Debug, Clone, Args)]
pub struct RateLimitConfig {
    /// Enable per-client rate limiting
    #[arg(
        id = "rate_limit_enabled",
        long = "rate-limit-enabled",
        env = "RATE_LIMIT_ENABLED",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub enabled: bool,

    /// Admin API requests per client and window
    #[arg(
        long = "rate-limit-max-requests",
        env = "RATE_LIMIT_MAX_REQUESTS",
        default_value = "5000"
    )]
    pub api_max: u32,

    #[arg(long = "rate-limit-window-secs", env = "RATE_LIMIT_WINDOW_SECS", default_value = "900")]
    pub api_window_secs: u64,

    /// Login, register and refresh attempts per client and window
    #[arg(long = "auth-rate-limit-max", env = "AUTH_RATE_LIMIT_MAX", default_value = "100")]
    pub auth_max: u32,

    #[arg(
        long = "auth-rate-limit-window-secs",
        env = "AUTH_RATE_LIMIT_WINDOW_SECS",
        default_value = "300"
    )]
    pub auth_window_secs: u64,

    /// Uploads per client and window
    #[arg(long = "upload-rate-limit-max", env = "UPLOAD_RATE_LIMIT_MAX", default_value = "100")]
    pub upload_max: u32,

    #[arg(
        long = "upload-rate-limit-window-secs",
        env = "UPLOAD_RATE_LIMIT_WINDOW_SECS",
        default_value = "3600"
    )]
    pub upload_window_secs: u64,
}

/// One rate limit pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub name: &'static str,
    pub max: u32,
    pub window: Duration,
}

impl Policy {
    /// Time to refill one request.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.window / self.max.max(1)
    }
}

impl RateLimitConfig {
    #[must_use]
    pub const fn api(&self) -> Policy {
        Policy {
            name: "api",
            max: self.api_max,
            window: Duration::from_secs(self.api_window_secs),
        }
    }

    #[must_use]
    pub const fn auth(&self) -> Policy {
        Policy {
            name: "auth",
            max: self.auth_max,
            window: Duration::from_secs(self.auth_window_secs),
        }
    }

    #[must_use]
    pub const fn upload(&self) -> Policy {
        Policy {
            name: "upload",
            max: self.upload_max,
            window: Duration::from_secs(self.upload_window_secs),
        }
    }

    /// Settings that cannot build a limiter.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        [self.api(), self.auth(), self.upload()]
            .into_iter()
            .filter(|p| p.max == 0 || p.period().is_zero())
            .map(|p| {
                format!(
                    "{} rate limit needs a max > 0 and a window of at least max ms",
                    p.name
                )
            })
            .collect()
    }

    /// Wrap every route of `router` in the limiter for `policy`.
    pub fn limit<S>(&self, router: Router<S>, policy: Policy) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        if !self.enabled {
            return router;
        }
        let Some(config) = GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .period(policy.period())
            .burst_size(policy.max)
            .use_headers()
            .finish()
        else {
            warn!(pool = policy.name, "Invalid rate limit settings, limiter disabled");
            return router;
        };

        router
            .layer(GovernorLayer {
                config: Arc::new(config),
            })
            .layer(axum::middleware::map_response(move |response: Response| async move {
                rejection_envelope(policy.name, response)
            }))
    }
}

/// Re-render a limiter rejection as the standard JSON error.
fn rejection_envelope(pool: &str, response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }
    warn!(pool, "Rate limit exceeded");

    let retry_after = response.headers().get(header::RETRY_AFTER).cloned();
    let mut rejected =
        AppError::RateLimited("Too many requests, please try again later".to_string())
            .into_response();
    if let Some(value) = retry_after {
        rejected.headers_mut().insert(header::RETRY_AFTER, value);
    }
    rejected
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use http::Request;
    use tower::ServiceExt;

    pub(crate) fn test_rate_limits() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            api_max: 5000,
            api_window_secs: 900,
            auth_max: 100,
            auth_window_secs: 300,
            upload_max: 100,
            upload_window_secs: 3600,
        }
    }

    fn from_client(ip: &str) -> Request<Body> {
        Request::builder()
            .uri("/login")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn window_is_spread_over_the_pool() {
        let limits = test_rate_limits();
        assert_eq!(limits.auth().period(), Duration::from_secs(3));
        assert_eq!(limits.upload().period(), Duration::from_secs(36));
        assert_eq!(limits.api().period(), Duration::from_millis(180));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(test_rate_limits().validate().is_empty());
    }

    #[test]
    fn empty_pool_is_rejected() {
        let mut limits = test_rate_limits();
        limits.upload_max = 0;
        let errors = limits.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("upload"));

        limits.enabled = false;
        assert!(limits.validate().is_empty());
    }

    #[test]
    fn rejection_keeps_retry_after() {
        let response = http::Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .header(header::RETRY_AFTER, "3")
            .body(Body::from("Too Many Requests! Wait for 3s"))
            .unwrap();

        let rejected = rejection_envelope("auth", response);
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejected.headers()[header::RETRY_AFTER], "3");
        assert_eq!(
            rejected.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[test]
    fn other_responses_pass_through() {
        let response = http::Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            rejection_envelope("auth", response).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn clients_over_the_limit_get_429() {
        let mut limits = test_rate_limits();
        limits.auth_max = 1;
        limits.auth_window_secs = 60;
        let login = Router::new().route("/login", get(|| async { "ok" }));
        let app = limits.limit(login, limits.auth());

        let first = app.clone().oneshot(from_client("203.0.113.7")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.clone().oneshot(from_client("203.0.113.7")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(from_client("198.51.100.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn disabled_limits_leave_routes_untouched() {
        let mut limits = test_rate_limits();
        limits.enabled = false;
        limits.auth_max = 1;
        let login = Router::new().route("/login", get(|| async { "ok" }));
        let app = limits.limit(login, limits.auth());

        for _ in 0..3 {
            let response = app.clone().oneshot(from_client("203.0.113.7")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
