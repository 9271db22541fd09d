//! Observability stack for the signage service.
//!
//! - **Logging**: `tracing-subscriber` with JSON or compact console output
//! - **Tracing**: optional OpenTelemetry OTLP export
//! - **Metrics**: Prometheus recorder rendered by the `/metrics` route
//! - **Error tracking**: optional Sentry reporting
//!
//! # Features
//! - `otlp` (default): OpenTelemetry OTLP exporter
//! - `prometheus` (default): Prometheus metrics exporter
//! - `sentry` (default): Sentry error tracking

#[cfg(feature = "otlp")]
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "prometheus")]
pub use metrics_exporter_prometheus::PrometheusHandle;

#[cfg(feature = "otlp")]
use opentelemetry::KeyValue;
#[cfg(feature = "otlp")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otlp")]
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracerProvider},
};

#[cfg(feature = "sentry")]
pub use sentry;

/// Default service name reported to tracing backends.
pub const DEFAULT_SERVICE_NAME: &str = "signage-service";

/// Crates whose logs are capped regardless of the configured level.
const QUIET_TARGETS: &[&str] = &[
    "sqlx::query=warn",
    "tower=info",
    "tower_http=info",
    "hyper=info",
    "h2=info",
    "reqwest=info",
    "ldap3=info",
    "sentry=warn",
];

/// Request latency buckets in seconds.
#[cfg(feature = "prometheus")]
const HTTP_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: String,
    pub json_logs: bool,
    pub otlp_endpoint: Option<String>,
    pub sentry_dsn: Option<String>,
    /// Environment name, e.g. "production"
    pub environment: Option<String>,
    pub version: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: "INFO".to_string(),
            json_logs: true,
            otlp_endpoint: None,
            sentry_dsn: None,
            environment: None,
            version: None,
        }
    }
}

/// Active telemetry handles that need graceful shutdown.
pub struct TelemetryGuard {
    #[cfg(feature = "otlp")]
    otel_provider: Option<SdkTracerProvider>,
    #[cfg(feature = "sentry")]
    _sentry_guard: Option<sentry::ClientInitGuard>,
}

impl TelemetryGuard {
    /// Flush and shut down exporters. Sentry flushes when its guard drops.
    pub fn shutdown(self) {
        #[cfg(feature = "otlp")]
        if let Some(provider) = self.otel_provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown OpenTelemetry provider: {e}");
        }
    }
}

/// Map a textual level to a tracing level, defaulting to INFO.
#[must_use]
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the log filter: `RUST_LOG` first, then the configured level and
/// the caps in [`QUIET_TARGETS`].
fn build_filter(level: Level) -> EnvFilter {
    QUIET_TARGETS.iter().fold(
        EnvFilter::from_default_env().add_directive(level.into()),
        |filter, directive| match directive.parse() {
            Ok(d) => filter.add_directive(d),
            Err(_) => filter,
        },
    )
}

/// Install the Prometheus recorder and return the handle for `/metrics`.
///
/// # Panics
/// Panics if a global recorder is already installed.
#[cfg(feature = "prometheus")]
#[must_use]
pub fn init_metrics() -> PrometheusHandle {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let builder = match builder.set_buckets_for_metric(
        metrics_exporter_prometheus::Matcher::Full("http_request_duration_seconds".to_string()),
        HTTP_DURATION_BUCKETS,
    ) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Invalid histogram buckets, using summaries: {e}");
            metrics_exporter_prometheus::PrometheusBuilder::new()
        }
    };
    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Start the OTLP span exporter. `None` when no endpoint is configured or
/// the exporter cannot be built.
#[cfg(feature = "otlp")]
fn init_opentelemetry(config: &TelemetryConfig) -> Option<SdkTracerProvider> {
    let endpoint = config.otlp_endpoint.as_deref()?;

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(5))
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("OTLP exporter disabled: {e}");
            return None;
        }
    };

    let mut attributes = vec![KeyValue::new("service.name", config.service_name.clone())];
    if let Some(env) = &config.environment {
        attributes.push(KeyValue::new("deployment.environment", env.clone()));
    }
    let resource = Resource::builder().with_attributes(attributes).build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());
    Some(provider)
}

/// Initialize Sentry. `None` when no DSN is configured.
#[cfg(feature = "sentry")]
fn init_sentry(config: &TelemetryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: config.version.clone().map(Into::into),
            environment: config.environment.clone().map(Into::into),
            traces_sample_rate: 0.2,
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    if guard.is_enabled() {
        Some(guard)
    } else {
        eprintln!("Sentry DSN provided but client not enabled");
        None
    }
}

/// Install the global subscriber and exporters.
///
/// Keep the returned guard alive for the process lifetime and call
/// [`TelemetryGuard::shutdown`] on exit.
///
/// # Panics
/// Panics if a global subscriber is already installed.
#[must_use]
pub fn setup_telemetry(config: &TelemetryConfig) -> TelemetryGuard {
    let env_filter = build_filter(parse_level(&config.log_level));

    // Sentry must be initialized before the subscriber captures events.
    #[cfg(feature = "sentry")]
    let sentry_guard = init_sentry(config);
    #[cfg(feature = "sentry")]
    let sentry_layer = sentry_guard.as_ref().map(|_| sentry_tracing::layer());
    #[cfg(not(feature = "sentry"))]
    let sentry_layer: Option<tracing_subscriber::layer::Identity> = None;

    #[cfg(feature = "otlp")]
    let otel_provider = init_opentelemetry(config);
    #[cfg(feature = "otlp")]
    let otel_layer = otel_provider.as_ref().map(|_| {
        let tracer = opentelemetry::global::tracer(config.service_name.clone());
        tracing_opentelemetry::layer().with_tracer(tracer)
    });
    #[cfg(not(feature = "otlp"))]
    let otel_layer: Option<tracing_subscriber::layer::Identity> = None;

    let fmt_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_string()))
            .compact()
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .with(sentry_layer)
        .init();

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        otlp = config.otlp_endpoint.is_some(),
        sentry = config.sentry_dsn.is_some(),
        "Telemetry initialized"
    );

    TelemetryGuard {
        #[cfg(feature = "otlp")]
        otel_provider,
        #[cfg(feature = "sentry")]
        _sentry_guard: sentry_guard,
    }
}

/// Report an error to Sentry when enabled.
#[cfg(feature = "sentry")]
pub fn capture_error<E: std::fmt::Display>(error: &E) {
    sentry::capture_message(&error.to_string(), sentry::Level::Error);
}

/// No-op without the `sentry` feature.
#[cfg(not(feature = "sentry"))]
pub fn capture_error<E: std::fmt::Display>(_error: &E) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_signage_service() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "signage-service");
        assert_eq!(config.log_level, "INFO");
        assert!(config.json_logs);
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn parse_level_is_case_insensitive() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level(" Warning "), Level::WARN);
        assert_eq!(parse_level("ERROR"), Level::ERROR);
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(parse_level("verbose"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn quiet_targets_are_valid_directives() {
        for directive in QUIET_TARGETS {
            assert!(
                directive.parse::<tracing_subscriber::filter::Directive>().is_ok(),
                "{directive}"
            );
        }
    }
}
