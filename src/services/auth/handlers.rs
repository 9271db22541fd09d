//! Thin axum handlers for `/api/auth`.

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use signage_core::{AppError, AuthInfo};
use tracing::instrument;

use super::{
    AuthResponse, AuthService, ChangePasswordRequest, LoginRequest, LogoutRequest, Profile,
    RefreshRequest, RegisterRequest,
};
use crate::core::{ApiResponse, JsonBody};

#[instrument(skip(svc, req))]
pub async fn register(
    State(svc): State<AuthService>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let result = svc.register(req).await?;
    Ok(ApiResponse::created(result).with_message("Registration successful"))
}

#[instrument(skip(svc, req))]
pub async fn login(
    State(svc): State<AuthService>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let result = svc.login(req).await?;
    Ok(ApiResponse::ok(result).with_message("Login successful"))
}

#[instrument(skip(svc, req))]
pub async fn refresh(
    State(svc): State<AuthService>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    Ok(ApiResponse::ok(svc.refresh(&req.refresh_token).await?))
}

/// The body is optional; an empty or unparsable body logs out nothing.
#[instrument(skip(svc, body))]
pub async fn logout(
    State(svc): State<AuthService>,
    body: Bytes,
) -> Result<ApiResponse<()>, AppError> {
    let req: LogoutRequest = serde_json::from_slice(&body).unwrap_or_default();
    svc.logout(req.refresh_token.as_deref()).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn me(
    State(svc): State<AuthService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<Profile>, AppError> {
    Ok(ApiResponse::ok(svc.profile(auth.user_id).await?))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn change_password(
    State(svc): State<AuthService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    svc.change_password(auth.user_id, req).await?;
    Ok(ApiResponse::message("Password changed successfully"))
}
