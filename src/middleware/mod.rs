//! Tower middleware for the REST API.
//!
//! # Middleware Order
//! When using `.layer()` on a router the outermost layer is added last.
//! Requests flow outermost → innermost → handler; responses flow back.
//!
//! Applied order:
//! 1. `RequestIdLayer` - propagate or generate `x-request-id`
//! 2. `TraceLayer` - request span with `request_id` and `user_id`
//! 3. `MetricsLayer` - request count and latency
//! 4. `TimeoutLayer` - request timeout
//! 5. `CorsLayer` - CORS handling
//! 6. `AuthLayer` - JWT authentication (skips public routes)
//! 7. `rate_limit` - per-route-group client limits, innermost

pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use auth::AuthLayer;
pub use metrics::MetricsLayer;
pub use rate_limit::RateLimitConfig;
pub use request_id::RequestIdLayer;
