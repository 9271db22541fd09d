//! Signage service entry point.

use std::net::SocketAddr;

use signage_service::{Config, build_app};
use signage_telemetry::{TelemetryConfig, init_metrics, setup_telemetry};
use tokio::signal;
use tracing::{error, info};

/// Build version (injected at compile time)
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init()?;

    let telemetry = setup_telemetry(&TelemetryConfig {
        log_level: config.log_level.clone(),
        json_logs: config.json_logs,
        otlp_endpoint: config.otlp_endpoint.clone(),
        sentry_dsn: config.sentry_dsn.clone(),
        environment: config.environment.clone(),
        version: Some(VERSION.to_string()),
        ..TelemetryConfig::default()
    });
    let metrics_handle = init_metrics();

    info!(
        version = VERSION,
        address = %config.http_address,
        max_licensed_displays = config.max_licensed_displays,
        sso = config.sso.enabled,
        pid = std::process::id(),
        "Starting signage-service"
    );

    let (app, addr) = match build_app(&config, metrics_handle).await {
        Ok(built) => built,
        Err(e) => {
            error!(error = %e, "Startup failed");
            signage_telemetry::capture_error(&e);
            telemetry.shutdown();
            return Err(e);
        }
    };

    info!(address = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry.shutdown();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
