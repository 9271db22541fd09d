//! Device REST handlers.
//!
//! The pairing endpoints are outside JWT auth; `status`, `heartbeat` and
//! `content` authenticate with the device token instead.

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use http::HeaderMap;
use signage_core::{AppError, AuthInfo};
use signage_db::DeviceRegistration;
use tracing::instrument;

use super::{
    AuthorizeDeviceRequest, ContentQuery, DeviceContent, DeviceListQuery, DeviceNotesRequest,
    DeviceService, DeviceState, HeartbeatRequest, RegisterDeviceRequest, RegisterDeviceResponse,
    UpdateDeviceRequest, VerifyDeviceRequest,
};
use crate::core::{ApiResponse, JsonBody, PathParam, QueryParams};

// ============================================================================
// Device-facing
// ============================================================================

#[instrument(skip_all, fields(serial_number = %req.serial_number))]
pub async fn register(
    State(svc): State<DeviceService>,
    JsonBody(req): JsonBody<RegisterDeviceRequest>,
) -> Result<ApiResponse<RegisterDeviceResponse>, AppError> {
    let (response, created) = svc.register(req).await?;
    Ok(if created {
        ApiResponse::created(response)
            .with_message("Device registered. Waiting for administrator approval.")
    } else {
        ApiResponse::ok(response).with_message("Device already registered. Status updated.")
    })
}

#[instrument(skip_all, fields(serial_number = %req.serial_number))]
pub async fn verify(
    State(svc): State<DeviceService>,
    JsonBody(req): JsonBody<VerifyDeviceRequest>,
) -> Result<ApiResponse<DeviceState>, AppError> {
    Ok(ApiResponse::ok(svc.verify(req).await?))
}

#[instrument(skip_all)]
pub async fn status(
    State(svc): State<DeviceService>,
    headers: HeaderMap,
) -> Result<ApiResponse<DeviceState>, AppError> {
    Ok(ApiResponse::ok(svc.status(&headers).await?))
}

/// The body is optional; devices may send an empty heartbeat.
#[instrument(skip_all)]
pub async fn heartbeat(
    State(svc): State<DeviceService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<DeviceState>, AppError> {
    let req: HeartbeatRequest = serde_json::from_slice(&body).unwrap_or_default();
    Ok(ApiResponse::ok(
        svc.heartbeat(&headers, req.app_version.as_deref()).await?,
    ))
}

#[instrument(skip_all)]
pub async fn content(
    State(svc): State<DeviceService>,
    headers: HeaderMap,
    QueryParams(query): QueryParams<ContentQuery>,
) -> Result<ApiResponse<DeviceContent>, AppError> {
    Ok(ApiResponse::ok(
        svc.content(&headers, query.current_post_id).await?,
    ))
}

// ============================================================================
// Admin
// ============================================================================

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn list(
    State(svc): State<DeviceService>,
    Extension(auth): Extension<AuthInfo>,
    QueryParams(query): QueryParams<DeviceListQuery>,
) -> Result<ApiResponse<Vec<DeviceRegistration>>, AppError> {
    Ok(ApiResponse::ok(svc.list(&auth, query.status).await?))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<DeviceService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<DeviceRegistration>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, id).await?))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn authorize(
    State(svc): State<DeviceService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<AuthorizeDeviceRequest>,
) -> Result<ApiResponse<DeviceRegistration>, AppError> {
    let device = svc
        .authorize(&auth, id, req.display_id, req.notes.as_deref())
        .await?;
    Ok(ApiResponse::ok(device).with_message("Device authorized"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn reject(
    State(svc): State<DeviceService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<DeviceNotesRequest>,
) -> Result<ApiResponse<DeviceRegistration>, AppError> {
    let device = svc.reject(&auth, id, req.notes.as_deref()).await?;
    Ok(ApiResponse::ok(device).with_message("Device rejected"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn revoke(
    State(svc): State<DeviceService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<DeviceNotesRequest>,
) -> Result<ApiResponse<DeviceRegistration>, AppError> {
    let device = svc.revoke(&auth, id, req.notes.as_deref()).await?;
    Ok(ApiResponse::ok(device).with_message("Device authorization revoked"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn update(
    State(svc): State<DeviceService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<UpdateDeviceRequest>,
) -> Result<ApiResponse<DeviceRegistration>, AppError> {
    let device = svc.update(&auth, id, req).await?;
    Ok(ApiResponse::ok(device).with_message("Device updated"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn delete(
    State(svc): State<DeviceService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<()>, AppError> {
    svc.delete(&auth, id).await?;
    Ok(ApiResponse::message("Device deleted"))
}
