//! Structured error handling for REST handlers.
//!
//! Provides type-safe error handling with automatic conversion to HTTP responses.
//! Internal details are logged but never exposed to clients.

use std::fmt::Display;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Application error type with automatic response conversion.
///
/// Internal details are logged but sanitized messages are sent to clients.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a not found error for an entity.
    pub fn not_found(entity: &str, id: impl Display) -> Self {
        Self::NotFound(format!("{entity} not found: {id}"))
    }

    /// Create an error for invalid or expired tokens.
    #[must_use]
    pub fn token_invalid(token_type: &str) -> Self {
        Self::Unauthenticated(format!("Invalid or expired {token_type}"))
    }

    /// Create a conflict error for duplicate data.
    #[must_use]
    pub fn conflict(entity: &str, field: &str) -> Self {
        Self::Conflict(format!("{entity} with this {field} already exists"))
    }

    /// Create an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a permission denied error.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients.
    fn public_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Unauthenticated(msg)
            | Self::PermissionDenied(msg)
            | Self::InvalidArgument(msg)
            | Self::Conflict(msg)
            | Self::PayloadTooLarge(msg)
            | Self::RateLimited(msg) => msg.clone(),
            Self::Unavailable(msg) => {
                error!(error = %msg, "Dependency unavailable");
                "Service temporarily unavailable".to_string()
            }
            Self::Internal(msg) => {
                error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({ "success": false, "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

/// Extension trait for converting foreign errors to `AppError` with logging.
pub trait ResultExt<T> {
    /// Convert error to `AppError::Internal`, logging the source.
    fn internal(self, msg: &'static str) -> Result<T, AppError>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn internal(self, msg: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            error!(error = %e, "{msg}");
            AppError::Internal(msg.to_string())
        })
    }
}

/// Extension trait for Option types.
pub trait OptionExt<T> {
    /// Convert `None` to a not found error.
    fn ok_or_not_found(self, entity: &str, id: impl Display) -> Result<T, AppError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str, id: impl Display) -> Result<T, AppError> {
        self.ok_or_else(|| AppError::not_found(entity, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_helper_formats_correctly() {
        let err = AppError::not_found("Display", 42);
        assert!(err.to_string().contains("Display"));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn conflict_helper_formats_correctly() {
        let err = AppError::conflict("Display", "identifier");
        assert!(err.to_string().contains("Display"));
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn status_mapping_matches_http_semantics() {
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthenticated("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::PermissionDenied("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::token_invalid("refresh token").status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AppError::Internal("connection string leaked".into());
        assert_eq!(err.public_message(), "Internal server error");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rate_limits_are_reported_verbatim() {
        let err = AppError::RateLimited("Too many requests".into());
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.public_message(), "Too many requests");
    }

    #[test]
    fn option_ext_maps_none_to_not_found() {
        let value: Option<i32> = None;
        let err = value.ok_or_not_found("Post", 7).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
