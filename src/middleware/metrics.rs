//! Request metrics middleware.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `http_requests_total` | Counter | `method`, `path`, `status` |
//! | `http_request_duration_seconds` | Histogram | `method`, `path`, `status` |
//!
//! `path` is a route template: numeric segments become `:id` and the
//! free-form segments of known routes become named placeholders, so label
//! cardinality stays bounded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{Request, Response};
use tower::{Layer, Service};

/// Non-API paths reported verbatim. Everything else outside `/api` is `/*`.
const KNOWN_PATHS: &[&str] = &["/", "/health", "/health/live", "/health/ready", "/metrics"];

#[derive(Clone, Copy, Default)]
pub struct MetricsLayer;

impl MetricsLayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().to_string();
        let path = normalize_path(req.uri().path());
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let labels = [
                ("method", method),
                ("path", path),
                ("status", response.status().as_u16().to_string()),
            ];

            metrics::counter!("http_requests_total", &labels).increment(1);
            metrics::histogram!("http_request_duration_seconds", &labels)
                .record(start.elapsed().as_secs_f64());

            Ok(response)
        })
    }
}

/// Reduce a request path to its route template.
fn normalize_path(path: &str) -> String {
    if KNOWN_PATHS.contains(&path) {
        return path.to_string();
    }
    if path.starts_with("/uploads/") {
        return "/uploads/:file".to_string();
    }
    let Some(rest) = path.strip_prefix("/api/") else {
        return "/*".to_string();
    };

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let mut template = String::from("/api");
    for (i, segment) in segments.iter().enumerate() {
        let previous = i.checked_sub(1).map(|p| segments[p]);
        let placeholder = if segment.bytes().all(|b| b.is_ascii_digit()) {
            Some(":id")
        } else {
            match (segments.first().copied(), previous) {
                (Some("public"), Some("displays")) => Some(":identifier"),
                (Some("settings"), Some("settings")) => Some(":key"),
                (Some("users"), Some("permissions")) => Some(":permission"),
                _ => None,
            }
        };
        template.push('/');
        template.push_str(placeholder.unwrap_or(segment));
    }
    template
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_paths_pass_through() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn numeric_segments_become_ids() {
        assert_eq!(normalize_path("/api/posts/42"), "/api/posts/:id");
        assert_eq!(
            normalize_path("/api/devices/7/authorize"),
            "/api/devices/:id/authorize"
        );
    }

    #[test]
    fn named_segments_become_placeholders() {
        assert_eq!(
            normalize_path("/api/public/displays/lobby-1/posts"),
            "/api/public/displays/:identifier/posts"
        );
        assert_eq!(normalize_path("/api/settings/site.title"), "/api/settings/:key");
        assert_eq!(
            normalize_path("/api/users/3/permissions/posts.read"),
            "/api/users/:id/permissions/:permission"
        );
        assert_eq!(normalize_path("/uploads/abc.png"), "/uploads/:file");
    }

    #[test]
    fn unknown_paths_are_bucketed() {
        assert_eq!(normalize_path("/favicon.ico"), "/*");
        assert_eq!(normalize_path("/admin/index.html"), "/*");
    }
}
