//! REST routes and health check handlers.

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Serialize;
use http::{HeaderValue, header};
use signage_telemetry::PrometheusHandle;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::core::ServiceContext;
use crate::middleware::rate_limit::RateLimitConfig;
use crate::services::{
    auth, categories, devices, displays, media, organizations, posts, public, settings, sso,
    system, users,
};
use crate::startup::AppState;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    checks: Option<HealthChecks>,
}

#[derive(Serialize)]
pub struct HealthChecks {
    database: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl CheckResult {
    const fn healthy() -> Self {
        Self {
            status: "healthy",
            message: None,
        }
    }

    fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: "unhealthy",
            message: Some(message.into()),
        }
    }
}

/// Build version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build all REST routes with the given application state.
pub fn rest_routes(
    state: AppState,
    ctx: &ServiceContext,
    metrics: PrometheusHandle,
    limits: &RateLimitConfig,
) -> Router {
    let upload_limit = ctx.uploads().max_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(|| async { "signage-service" }))
        .route("/health", get(|| async { "OK" }))
        .route("/health/live", get(|| async { "OK" }))
        .route("/health/ready", get(readiness_handler))
        .route(
            "/metrics",
            get(move || {
                let handle = metrics.clone();
                async move { handle.render() }
            }),
        )
        .merge(limits.limit(credential_routes(), limits.auth()))
        .merge(auth_routes())
        .merge(limits.limit(upload_routes(upload_limit), limits.upload()))
        .merge(limits.limit(admin_routes(), limits.api()))
        .merge(device_routes())
        .merge(public_routes())
        .nest_service(
            "/uploads",
            tower::ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .service(ServeDir::new(&ctx.uploads().dir)),
        )
        .with_state(state)
}

/// Endpoints that exchange credentials for tokens.
fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(auth::handlers::register))
        .route("/api/auth/login", post(auth::handlers::login))
        .route("/api/auth/refresh", post(auth::handlers::refresh))
        .route("/api/auth/ldap/login", post(sso::handlers::ldap_login))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/logout", post(auth::handlers::logout))
        .route("/api/auth/me", get(auth::handlers::me))
        .route("/api/auth/sso/status", get(sso::handlers::status))
        .route("/api/auth/sso/login", get(sso::handlers::login))
        .route("/api/auth/sso/callback", get(sso::handlers::callback))
        .route("/api/auth/sso/logout", get(sso::handlers::logout))
        .route("/api/sso/config", get(sso::handlers::config))
        .route("/api/sso/ldap/test", post(sso::handlers::ldap_test))
}

fn upload_routes(upload_limit: usize) -> Router<AppState> {
    Router::new().route(
        "/api/media/upload",
        post(media::upload).layer(DefaultBodyLimit::max(upload_limit)),
    )
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        // Users and permissions
        .route("/api/users", get(users::handlers::list).post(users::handlers::create))
        .route("/api/users/roles", get(users::handlers::roles))
        .route("/api/users/permissions", get(users::handlers::permission_catalogue))
        .route(
            "/api/users/change-password",
            patch(auth::handlers::change_password),
        )
        .route(
            "/api/users/{id}",
            get(users::handlers::get)
                .put(users::handlers::update)
                .delete(users::handlers::delete),
        )
        .route(
            "/api/users/{id}/toggle-active",
            patch(users::handlers::toggle_active),
        )
        .route(
            "/api/users/{id}/reset-password",
            patch(users::handlers::reset_password),
        )
        .route("/api/users/{id}/permissions", get(users::handlers::user_permissions))
        .route(
            "/api/users/{id}/permissions/{permission}",
            put(users::handlers::set_permission).delete(users::handlers::clear_permission),
        )
        // Organizations
        .route(
            "/api/organizations",
            get(organizations::list).post(organizations::create),
        )
        .route(
            "/api/organizations/{id}",
            get(organizations::get).put(organizations::update),
        )
        // Categories
        .route("/api/categories", get(categories::list).post(categories::create))
        .route("/api/categories/reorder", put(categories::reorder))
        .route(
            "/api/categories/{id}",
            get(categories::get)
                .put(categories::update)
                .delete(categories::delete),
        )
        // Posts
        .route(
            "/api/posts",
            get(posts::handlers::list)
                .post(posts::handlers::create)
                .delete(posts::handlers::delete_all),
        )
        .route("/api/posts/reorder", put(posts::handlers::reorder))
        .route("/api/posts/priorities", put(posts::handlers::update_priorities))
        .route(
            "/api/posts/{id}",
            get(posts::handlers::get)
                .put(posts::handlers::update)
                .delete(posts::handlers::delete),
        )
        // Media
        .route("/api/media", get(media::list))
        .route("/api/media/{id}", get(media::get).delete(media::delete))
        // Displays
        .route("/api/displays", get(displays::list).post(displays::create))
        .route("/api/displays/{id}/posts", get(displays::posts))
        .route(
            "/api/displays/{id}",
            get(displays::get)
                .put(displays::update)
                .delete(displays::delete),
        )
        // Devices (admin)
        .route("/api/devices", get(devices::handlers::list))
        .route(
            "/api/devices/{id}",
            get(devices::handlers::get)
                .put(devices::handlers::update)
                .delete(devices::handlers::delete),
        )
        .route("/api/devices/{id}/authorize", post(devices::handlers::authorize))
        .route("/api/devices/{id}/reject", post(devices::handlers::reject))
        .route("/api/devices/{id}/revoke", post(devices::handlers::revoke))
        // Settings
        .route("/api/settings", get(settings::get_all))
        .route("/api/settings/bulk", post(settings::set_bulk))
        .route(
            "/api/settings/{key}",
            get(settings::get).put(settings::set).delete(settings::delete),
        )
        // System
        .route(
            "/api/system/cache",
            get(system::cache_stats).delete(system::flush_cache),
        )
}

/// Device endpoints authenticated with the device token.
fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/api/devices/register", post(devices::handlers::register))
        .route("/api/devices/verify", post(devices::handlers::verify))
        .route("/api/devices/status", get(devices::handlers::status))
        .route("/api/devices/heartbeat", post(devices::handlers::heartbeat))
        .route("/api/devices/content", get(devices::handlers::content))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/public/info", get(public::info))
        .route("/api/public/posts", get(public::active_posts))
        .route("/api/public/posts/{id}", get(public::post))
        .route("/api/public/categories", get(public::categories))
        .route("/api/public/settings", get(settings::get_all))
        .route("/api/public/displays", get(displays::public_list))
        .route("/api/public/display/{identifier}", get(displays::public_get))
        .route(
            "/api/public/display/{identifier}/posts",
            get(displays::public_posts),
        )
}

async fn readiness_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_check = if state.db.health_check().await {
        CheckResult::healthy()
    } else {
        CheckResult::unhealthy("Database connection failed")
    };

    let healthy = db_check.status == "healthy";

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: VERSION,
        checks: Some(HealthChecks { database: db_check }),
    })
}
