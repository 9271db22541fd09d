//! Database repository layer with connection pooling for the signage schema.
//!
//! # Error Handling
//!
//! All repository methods return `Result<T, AppError>` where errors are:
//! - `AppError::Unavailable` - Database connection or query failures
//! - `AppError::NotFound` - Requested entity does not exist
//! - `AppError::Conflict` - Unique constraint violated
//! - `AppError::InvalidArgument` - Check or foreign key constraint violated
//! - `AppError::PermissionDenied` - Licence pool full

#![expect(
    clippy::missing_errors_doc,
    reason = "error handling documented at module level"
)]

mod category;
mod config;
mod device;
mod display;
mod media;
mod oauth_state;
mod organization;
mod permission;
mod post;
mod session;
mod setting;
mod user;

use sqlx::postgres::PgPool;

use crate::AppError;

pub use category::CategoryRepository;
pub use config::{DbConfig, create_pool};
pub use device::DeviceRepository;
pub use display::DisplayRepository;
pub use media::MediaRepository;
pub use oauth_state::OAuthStateRepository;
pub use organization::OrganizationRepository;
pub use permission::PermissionRepository;
pub use post::PostRepository;
pub use session::SessionRepository;
pub use setting::SettingRepository;
pub use user::UserRepository;

/// Embedded schema migrations.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Combined database context.
#[derive(Debug, Clone)]
pub struct Database {
    pub organizations: OrganizationRepository,
    pub users: UserRepository,
    pub permissions: PermissionRepository,
    pub sessions: SessionRepository,
    pub oauth_states: OAuthStateRepository,
    pub categories: CategoryRepository,
    pub media: MediaRepository,
    pub displays: DisplayRepository,
    pub posts: PostRepository,
    pub devices: DeviceRepository,
    pub settings: SettingRepository,
    pool: PgPool,
}

impl Database {
    /// Creates a new database context with all repositories.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            organizations: OrganizationRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            permissions: PermissionRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            oauth_states: OAuthStateRepository::new(pool.clone()),
            categories: CategoryRepository::new(pool.clone()),
            media: MediaRepository::new(pool.clone()),
            displays: DisplayRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            devices: DeviceRepository::new(pool.clone()),
            settings: SettingRepository::new(pool.clone()),
            pool,
        }
    }

    /// Apply pending embedded migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Unavailable(format!("Migration failed: {e}")))
    }

    /// Check database health by executing a simple query.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Returns a reference to the underlying connection pool.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
