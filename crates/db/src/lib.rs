//! Database layer with SQLx for the signage service.
//!
//! Provides:
//! - Connection pool management via [`create_pool`]
//! - Embedded schema migrations via [`Database::migrate`]
//! - Repository pattern for data access via [`Database`]
//! - Serializable models that double as REST payloads
//!
//! # Example
//!
//! ```ignore
//! use signage_db::{create_pool, Database, DbConfig};
//!
//! let pool = create_pool(&DbConfig::from_url("postgres://localhost/signage")).await?;
//! let db = Database::new(pool);
//! db.migrate().await?;
//!
//! let display = db.displays.get_by_identifier("lobby").await?;
//! ```

#![expect(clippy::doc_markdown, reason = "SQLx capitalization is intentional")]

mod licence;
mod models;
mod repository;
mod transitions;

use signage_core::AppError;

// =============================================================================
// Internal helpers
// =============================================================================

/// Postgres SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATEs caused by the request data rather than the database:
/// foreign key violation, check violation, invalid text representation.
const CLIENT_DATA_ERRORS: [&str; 3] = ["23503", "23514", "22P02"];

/// Database error wrapper for ergonomic error conversion.
///
/// Wraps `sqlx::Error` to enable automatic conversion to `AppError`
/// via the `?` operator throughout repository methods.
#[derive(Debug)]
struct DbError(sqlx::Error);

impl From<sqlx::Error> for DbError {
    #[inline]
    fn from(e: sqlx::Error) -> Self {
        Self(e)
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        if let sqlx::Error::Database(db_err) = &e.0 {
            let constraint = db_err.constraint();
            if let Some(err) = classify_sqlstate(db_err.code().as_deref(), constraint) {
                return err;
            }
        }
        Self::Unavailable(e.0.to_string())
    }
}

/// Client-facing error for a database error code, or `None` when the
/// failure is on the database side.
fn classify_sqlstate(code: Option<&str>, constraint: Option<&str>) -> Option<AppError> {
    let code = code?;
    if code == UNIQUE_VIOLATION {
        return Some(AppError::Conflict(format!(
            "Duplicate value violates {}",
            constraint.unwrap_or("a unique constraint")
        )));
    }
    if CLIENT_DATA_ERRORS.contains(&code) {
        return Some(AppError::InvalidArgument(match constraint {
            Some(constraint) => format!("Value violates {constraint}"),
            None => "Invalid value".to_string(),
        }));
    }
    None
}

// =============================================================================
// Public exports - Enums and state machine
// =============================================================================

pub use models::{
    ContentType, DeviceStatus, DisplayMode, PostSort, SettingType, SortOrder, SsoProvider,
};
pub use licence::{LicencePool, LicenceSeat};
pub use transitions::DeviceAction;

// =============================================================================
// Public exports - Database models (own their data)
// =============================================================================

pub use models::{
    Category, ConsumedOAuthState, DeviceRegistration, Display, DisplayWithStats, Media,
    Organization, Page, Post, Setting, User, UserPermission,
};

// =============================================================================
// Public exports - Parameter types (borrow from caller)
// =============================================================================

pub use models::{
    CreateCategoryParams, CreateDisplayParams, CreateMediaParams, CreateOrganizationParams,
    CreatePostParams, CreateUserParams, DeviceTransitionParams, PostListParams,
    RegisterDeviceParams, UpdateCategoryParams, UpdateDeviceParams, UpdateDisplayParams,
    UpdateOrganizationParams, UpdatePostParams, UpdateUserParams, UpsertSettingParams,
    UserListParams,
};

// =============================================================================
// Public exports - Repository and config
// =============================================================================

pub use repository::{
    CategoryRepository, Database, DbConfig, DeviceRepository, DisplayRepository, MediaRepository,
    OAuthStateRepository, OrganizationRepository, PermissionRepository, PostRepository,
    SessionRepository, SettingRepository, UserRepository, create_pool,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_are_conflicts() {
        let err = classify_sqlstate(Some("23505"), Some("displays_identifier_key")).unwrap();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.to_string().contains("displays_identifier_key"));
    }

    #[test]
    fn constraint_violations_are_client_errors() {
        for code in ["23503", "23514", "22P02"] {
            let err = classify_sqlstate(Some(code), Some("posts_priority_check")).unwrap();
            assert!(matches!(err, AppError::InvalidArgument(_)), "{code}");
        }
        assert!(matches!(
            classify_sqlstate(Some("22P02"), None),
            Some(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn server_side_failures_stay_unavailable() {
        assert!(classify_sqlstate(Some("53300"), None).is_none());
        assert!(classify_sqlstate(None, None).is_none());
    }
}
