//! Core library with shared types, traits, and error handling.
//!
//! This crate provides reusable components for the signage service:
//! - Error types with automatic HTTP response conversion
//! - Roles and the `resource.action` permission model
//! - Validation helpers
//! - JWT token generation and validation (with `jwt` feature)

pub mod error;
#[cfg(feature = "jwt")]
pub mod jwt;
pub mod role;
pub mod validation;

pub use error::{AppError, OptionExt, ResultExt};
#[cfg(feature = "jwt")]
pub use jwt::{AuthInfo, JwtError, JwtSubject, JwtValidator, OrgScope, TokenGenerator};
pub use role::{PermissionOverride, PermissionSet, UnknownVariant, UserRole, permissions};
