//! Device service: pairing of physical screens and their authorization.
//!
//! Organized by domain:
//! - `mod.rs` — Core types, device token auth, `DeviceService`
//! - `pairing.rs` — Device-facing endpoints (register, verify, heartbeat, content)
//! - `authorization.rs` — Admin state transitions and licence checks
//! - `handlers.rs` — Thin axum handlers

mod authorization;
pub mod handlers;
mod pairing;

use std::sync::Arc;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use signage_core::{AppError, AuthInfo};
use signage_db::{DeviceRegistration, DeviceStatus, Post};
use tracing::warn;

use super::displays::Playlist;
use crate::core::{ServiceContext, nullable};
use crate::middleware::auth::bearer_from_headers;

// ============================================================================
// DeviceService
// ============================================================================

#[derive(Clone)]
pub struct DeviceService {
    ctx: Arc<ServiceContext>,
}

impl DeviceService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Resolve the calling device from its `Authorization: Bearer` token.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<DeviceRegistration, AppError> {
        let token = bearer_from_headers(headers)
            .map_err(|_| AppError::Unauthenticated("Device token required".to_string()))?;

        match self.ctx.db().devices.find_by_token(token).await? {
            Some(device) => Ok(device),
            None => {
                warn!(security = true, "Request with unknown device token");
                Err(AppError::Unauthenticated("Invalid device token".to_string()))
            }
        }
    }
}

/// Unscoped registrations are visible to every tenant admin until claimed.
fn require_device_access(auth: &AuthInfo, device: &DeviceRegistration) -> Result<(), AppError> {
    match device.organization_id {
        None => Ok(()),
        org => auth.require_org(org, "device"),
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    #[serde(default)]
    pub serial_number: String,
    pub mac_address: Option<String>,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub device_os_version: Option<String>,
    pub app_version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceResponse {
    pub device_token: String,
    pub authorization_status: DeviceStatus,
    pub display_id: Option<i32>,
    pub display_identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDeviceRequest {
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub mac_address: String,
}

/// Authorization state as reported back to a device.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub authorized: bool,
    pub status: DeviceStatus,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_identifier: Option<String>,
}

impl From<&DeviceRegistration> for DeviceState {
    fn from(device: &DeviceRegistration) -> Self {
        let authorized = device.status.is_authorized();
        Self {
            authorized,
            status: device.status,
            message: device.status.device_message(),
            display_id: device.display_id.filter(|_| authorized),
            display_identifier: authorized
                .then(|| device.active_display_identifier().map(str::to_string))
                .flatten(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub app_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    /// Post currently on screen; `next` is the one after it.
    pub current_post_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct DeviceContent {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub next: Option<Post>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListQuery {
    pub status: Option<DeviceStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeDeviceRequest {
    pub display_id: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceNotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeviceRequest {
    pub device_name: Option<String>,
    /// `null` unassigns the display.
    #[serde(default, deserialize_with = "nullable")]
    pub display_id: Option<Option<i32>>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use signage_core::UserRole;

    fn device(status: DeviceStatus) -> DeviceRegistration {
        let now = Utc::now();
        DeviceRegistration {
            id: 1,
            serial_number: "SN-1".to_string(),
            mac_address: Some("AA:BB:CC:DD:EE:FF".to_string()),
            device_name: None,
            device_model: None,
            device_os_version: None,
            app_version: None,
            device_token: "tok".to_string(),
            status,
            display_id: Some(4),
            organization_id: None,
            notes: None,
            authorized_by: None,
            authorized_at: None,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
            display_identifier: Some("lobby".to_string()),
            display_name: Some("Lobby".to_string()),
            display_is_active: Some(true),
        }
    }

    fn admin(org: Option<i32>) -> AuthInfo {
        AuthInfo {
            user_id: 9,
            email: "admin@example.com".to_string(),
            role: UserRole::Admin,
            organization_id: org,
        }
    }

    #[test]
    fn authorized_state_carries_display() {
        let state = DeviceState::from(&device(DeviceStatus::Authorized));
        assert!(state.authorized);
        assert_eq!(state.display_id, Some(4));
        assert_eq!(state.display_identifier.as_deref(), Some("lobby"));
    }

    #[test]
    fn inactive_display_is_not_announced() {
        let mut d = device(DeviceStatus::Authorized);
        d.display_is_active = Some(false);
        let state = DeviceState::from(&d);
        assert_eq!(state.display_id, Some(4));
        assert!(state.display_identifier.is_none());
    }

    #[test]
    fn pending_state_hides_display() {
        let state = DeviceState::from(&device(DeviceStatus::Pending));
        assert!(!state.authorized);
        assert!(state.display_id.is_none());
        assert!(state.display_identifier.is_none());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("displayId").is_none());
    }

    #[test]
    fn unclaimed_devices_are_visible_to_any_tenant() {
        let mut d = device(DeviceStatus::Pending);
        assert!(require_device_access(&admin(Some(2)), &d).is_ok());

        d.organization_id = Some(3);
        assert!(require_device_access(&admin(Some(2)), &d).is_err());
        assert!(require_device_access(&admin(Some(3)), &d).is_ok());
    }

    #[test]
    fn device_token_is_never_serialized() {
        let json = serde_json::to_value(device(DeviceStatus::Pending)).unwrap();
        assert!(json.get("deviceToken").is_none());
    }

    #[test]
    fn explicit_null_unassigns_the_display() {
        let req: UpdateDeviceRequest =
            serde_json::from_str(r#"{"displayId":null}"#).unwrap();
        assert_eq!(req.display_id, Some(None));

        let req: UpdateDeviceRequest = serde_json::from_str(r#"{"displayId":5}"#).unwrap();
        assert_eq!(req.display_id, Some(Some(5)));

        let req: UpdateDeviceRequest = serde_json::from_str(r#"{"notes":"rack 2"}"#).unwrap();
        assert_eq!(req.display_id, None);
    }
}
