//! Server startup and wiring.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::FromRef;
use http::{HeaderName, Request};
use signage_core::AppError;
use signage_db::{Database, DbConfig, create_pool};
use signage_telemetry::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{Level, debug, info, warn};

use crate::config::Config;
use crate::core::context::{TokenTtl, UploadSettings};
use crate::core::{JwtValidator, ServiceContext, TtlCache};
use crate::middleware::{AuthLayer, MetricsLayer, RequestIdLayer};
use crate::routes::rest_routes;
use crate::services::{
    AuthService, CategoryService, DeviceService, DisplayService, MediaService,
    OrganizationService, PostService, PublicService, SettingsService, SsoService, SystemService,
    UserService,
};

/// Request timeout duration.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for outbound calls (Azure AD token endpoint).
const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// How often expired sessions and OAuth states are deleted.
const PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Application state shared across handlers. Each handler extracts only the
/// service it needs.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub users: UserService,
    pub organizations: OrganizationService,
    pub categories: CategoryService,
    pub media: MediaService,
    pub displays: DisplayService,
    pub posts: PostService,
    pub devices: DeviceService,
    pub settings: SettingsService,
    pub public: PublicService,
    pub sso: SsoService,
    pub system: SystemService,
}

impl AppState {
    #[must_use]
    pub fn new(ctx: &Arc<ServiceContext>) -> Self {
        Self {
            db: ctx.db().clone(),
            auth: AuthService::new(Arc::clone(ctx)),
            users: UserService::new(Arc::clone(ctx)),
            organizations: OrganizationService::new(Arc::clone(ctx)),
            categories: CategoryService::new(Arc::clone(ctx)),
            media: MediaService::new(Arc::clone(ctx)),
            displays: DisplayService::new(Arc::clone(ctx)),
            posts: PostService::new(Arc::clone(ctx)),
            devices: DeviceService::new(Arc::clone(ctx)),
            settings: SettingsService::new(Arc::clone(ctx)),
            public: PublicService::new(Arc::clone(ctx)),
            sso: SsoService::new(Arc::clone(ctx)),
            system: SystemService::new(Arc::clone(ctx)),
        }
    }
}

/// Build and configure the complete application.
pub async fn build_app(
    config: &Config,
    metrics: PrometheusHandle,
) -> anyhow::Result<(Router, SocketAddr)> {
    let jwt_validator = JwtValidator::new(&config.jwt_secret_key);

    // Database
    let db_config = DbConfig {
        url: config.database_url(),
        pool_min: config.db_pool_min,
        pool_max: config.db_pool_max,
        connect_timeout: config.db_connect_timeout(),
        ..DbConfig::from_url(config.database_url())
    };
    let pool = create_pool(&db_config).await?;
    info!(host = db_config.redacted_host(), "Connected to database");
    let database = Database::new(pool);
    if config.db_migrate {
        database.migrate().await?;
        info!("Database migrations applied");
    }

    // Upload directory
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let addr: SocketAddr = config.http_address.parse()?;

    let http_client = reqwest::Client::builder()
        .timeout(HTTP_CLIENT_TIMEOUT)
        .build()?;

    let ctx = Arc::new(ServiceContext::new(
        database.clone(),
        jwt_validator.clone(),
        TokenTtl {
            access_minutes: config.access_token_ttl_minutes,
            refresh_days: config.refresh_token_ttl_days,
        },
        TtlCache::new(config.cache_ttl(), config.cache_max_keys),
        config.max_licensed_displays,
        UploadSettings {
            dir: config.upload_dir.clone(),
            max_bytes: config.max_upload_bytes,
        },
        config.sso.clone(),
        config.admin_url.clone(),
        http_client,
    ));

    if config.sso.enabled {
        info!(provider = config.sso.provider.as_str(), "SSO enabled");
    }

    spawn_expiry_purge(database);

    let app_state = AppState::new(&ctx);
    let rest_router = rest_routes(app_state, &ctx, metrics, &config.rate_limit);

    let cors = build_cors(config.cors_allow_origins.as_deref());

    // Executes top-to-bottom on request
    let middleware = ServiceBuilder::new()
        .layer(RequestIdLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(MetricsLayer::new())
        .layer(TimeoutLayer::with_status_code(
            http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(cors)
        .layer(AuthLayer::new(jwt_validator));

    Ok((rest_router.layer(middleware), addr))
}

/// Delete expired sessions and abandoned SSO login attempts in the background.
fn spawn_expiry_purge(db: Database) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            log_purge("sessions", db.sessions.purge_expired().await);
            log_purge("OAuth states", db.oauth_states.purge_expired().await);
        }
    });
}

fn log_purge(what: &str, result: Result<u64, AppError>) {
    match result {
        Ok(0) => {}
        Ok(removed) => debug!(removed, "Purged expired {what}"),
        Err(e) => warn!(error = %e, "Failed to purge expired {what}"),
    }
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = match origins {
        Some(o) if o.trim() == "*" => CorsLayer::permissive(),
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            CorsLayer::new().allow_origin(origins)
        }
        None => CorsLayer::permissive(),
    };

    cors.allow_headers(Any)
        .expose_headers([HeaderName::from_static("x-request-id")])
        .allow_methods(Any)
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_lists_and_wildcards() {
        let _ = build_cors(Some("*"));
        let _ = build_cors(Some("https://admin.example.com, https://kiosk.example.com"));
        let _ = build_cors(None);
    }
}
