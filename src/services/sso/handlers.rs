//! Thin axum handlers for `/api/auth/sso`, `/api/auth/ldap` and `/api/sso`.

use axum::Extension;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use signage_core::{AppError, AuthInfo};
use tracing::instrument;

use super::{
    CallbackQuery, ConnectionReport, LdapLoginRequest, LoginQuery, LogoutResponse,
    SsoConfigView, SsoService, SsoStatus,
};
use crate::core::{ApiResponse, JsonBody, QueryParams};
use crate::services::auth::AuthResponse;
use crate::services::permissions::require_super_admin;

/// `302 Found` to `location`.
fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

pub async fn status(State(svc): State<SsoService>) -> ApiResponse<SsoStatus> {
    ApiResponse::ok(svc.status())
}

#[instrument(skip(svc))]
pub async fn login(
    State(svc): State<SsoService>,
    QueryParams(query): QueryParams<LoginQuery>,
) -> Response {
    found(svc.login_redirect(query.redirect.as_deref()).await)
}

#[instrument(skip_all)]
pub async fn callback(
    State(svc): State<SsoService>,
    QueryParams(query): QueryParams<CallbackQuery>,
) -> Response {
    found(svc.callback_redirect(query).await)
}

pub async fn logout(State(svc): State<SsoService>) -> ApiResponse<LogoutResponse> {
    ApiResponse::ok(svc.logout_target())
}

#[instrument(skip(svc, req), fields(username = %req.username))]
pub async fn ldap_login(
    State(svc): State<SsoService>,
    JsonBody(req): JsonBody<LdapLoginRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let result = svc.ldap_login(req).await?;
    Ok(ApiResponse::ok(result).with_message("Login successful"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn ldap_test(
    State(svc): State<SsoService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<ConnectionReport>, AppError> {
    Ok(ApiResponse::ok(svc.ldap_test(&auth).await?))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn config(
    State(svc): State<SsoService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<SsoConfigView>, AppError> {
    require_super_admin(&auth)?;
    Ok(ApiResponse::ok(svc.ctx.sso().redacted()))
}
