//! Multi-tenant digital signage content service.
//!
//! REST API for organizations, users, categories, posts, media, displays and
//! paired display devices, with Azure AD and LDAP sign-in.

pub mod config;
pub mod core;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod startup;

pub use config::Config;
pub use startup::{AppState, build_app};
