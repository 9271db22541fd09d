//! REST services, one per domain. Each owns its handlers.

pub mod auth;
pub mod categories;
pub mod devices;
pub mod displays;
pub mod media;
pub mod organizations;
pub mod permissions;
pub mod posts;
pub mod public;
pub mod settings;
pub mod sso;
pub mod system;
pub mod users;

pub use auth::AuthService;
pub use categories::CategoryService;
pub use devices::DeviceService;
pub use displays::DisplayService;
pub use media::MediaService;
pub use organizations::OrganizationService;
pub use posts::PostService;
pub use public::PublicService;
pub use settings::SettingsService;
pub use sso::SsoService;
pub use system::SystemService;
pub use users::UserService;
