//! Auth service: local credentials and token lifecycle.
//!
//! Organized by domain:
//! - `mod.rs` — Core types, `AuthService`
//! - `handlers.rs` — Thin axum handlers
//! - `authentication.rs` — Register, login, logout, profile
//! - `tokens.rs` — Refresh token rotation
//! - `password.rs` — Change own password

mod authentication;
pub mod handlers;
mod password;
mod tokens;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use signage_db::{Organization, User};

use crate::core::{ServiceContext, TokenPair};

/// Message for every failed credential check.
const INVALID_CREDENTIALS: &str = "Invalid email or password";

// ============================================================================
// AuthService
// ============================================================================

#[derive(Clone)]
pub struct AuthService {
    ctx: Arc<ServiceContext>,
}

impl AuthService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// User plus a fresh token pair.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Profile of the current user.
#[derive(Debug, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub organization: Option<Organization>,
    pub permissions: Vec<String>,
}
