//! Device-facing endpoints: registration, verification and content delivery.

use http::HeaderMap;
use signage_core::validation::{require_non_empty, validate_mac_address};
use signage_core::{AppError, TokenGenerator};
use signage_db::{DeviceRegistration, RegisterDeviceParams};
use tracing::{debug, info};

use super::{
    DeviceContent, DeviceService, DeviceState, RegisterDeviceRequest, RegisterDeviceResponse,
    VerifyDeviceRequest,
};
use crate::core::schedule;
use crate::services::displays::playlist;

fn trimmed(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl DeviceService {
    /// Register a device or refresh the info of a known serial.
    ///
    /// Returns the response and whether a new registration was created.
    pub(super) async fn register(
        &self,
        req: RegisterDeviceRequest,
    ) -> Result<(RegisterDeviceResponse, bool), AppError> {
        require_non_empty("serialNumber", &req.serial_number)?;
        let mac_address = trimmed(req.mac_address.as_ref());
        if let Some(mac) = mac_address {
            validate_mac_address(mac)?;
        }

        let token = TokenGenerator::generate_secure_token();
        let serial_number = req.serial_number.trim();
        let (device, created) = self
            .ctx
            .db()
            .devices
            .register(RegisterDeviceParams {
                serial_number,
                mac_address,
                device_name: trimmed(req.device_name.as_ref()),
                device_model: trimmed(req.device_model.as_ref()),
                device_os_version: trimmed(req.device_os_version.as_ref()),
                app_version: trimmed(req.app_version.as_ref()),
                device_token: &token,
            })
            .await?;

        if created {
            info!(
                device_id = device.id,
                serial_number,
                "Device registered, awaiting authorization"
            );
        } else {
            debug!(device_id = device.id, status = %device.status, "Known device re-registered");
        }

        let display_identifier = device.active_display_identifier().map(str::to_string);
        Ok((
            RegisterDeviceResponse {
                device_token: device.device_token,
                authorization_status: device.status,
                display_id: device.display_id,
                display_identifier,
            },
            created,
        ))
    }

    pub(super) async fn verify(&self, req: VerifyDeviceRequest) -> Result<DeviceState, AppError> {
        require_non_empty("serialNumber", &req.serial_number)?;
        require_non_empty("macAddress", &req.mac_address)?;
        let mac_address = req.mac_address.trim();
        validate_mac_address(mac_address)?;

        let db = self.ctx.db();
        let serial_number = req.serial_number.trim();
        let device = db
            .devices
            .find_by_serial(serial_number)
            .await?
            .ok_or_else(|| AppError::not_found("Device", serial_number))?;

        db.devices.touch(device.id, Some(mac_address)).await?;
        debug!(device_id = device.id, status = %device.status, "Device verified");
        Ok(DeviceState::from(&device))
    }

    pub(super) async fn status(&self, headers: &HeaderMap) -> Result<DeviceState, AppError> {
        let device = self.authenticate(headers).await?;
        Ok(DeviceState::from(&device))
    }

    pub(super) async fn heartbeat(
        &self,
        headers: &HeaderMap,
        app_version: Option<&str>,
    ) -> Result<DeviceState, AppError> {
        let device = self.authenticate(headers).await?;
        let device = self
            .ctx
            .db()
            .devices
            .heartbeat(device.id, app_version.map(str::trim).filter(|v| !v.is_empty()))
            .await?;
        Ok(DeviceState::from(&device))
    }

    /// Scheduled posts for the device's display, plus the one after `current`.
    pub(super) async fn content(
        &self,
        headers: &HeaderMap,
        current_post_id: Option<i32>,
    ) -> Result<DeviceContent, AppError> {
        let device = self.authenticate(headers).await?;
        let display_id = require_playable(&device)?;

        let display = self.ctx.db().displays.get(display_id).await?;
        if !display.is_active {
            return Err(AppError::forbidden("Assigned display is inactive"));
        }

        let playlist = playlist(&self.ctx, &display).await?;
        let next = schedule::next_after(&playlist.posts, current_post_id).cloned();
        Ok(DeviceContent { playlist, next })
    }
}

/// Only authorized devices with a display receive content.
fn require_playable(device: &DeviceRegistration) -> Result<i32, AppError> {
    if !device.status.is_authorized() {
        return Err(AppError::forbidden(format!(
            "Device is not authorized (status: {})",
            device.status
        )));
    }
    device
        .display_id
        .ok_or_else(|| AppError::forbidden("Device has no display assigned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use signage_db::DeviceStatus;

    fn device(status: DeviceStatus, display_id: Option<i32>) -> DeviceRegistration {
        let now = Utc::now();
        DeviceRegistration {
            id: 2,
            serial_number: "SN-2".to_string(),
            mac_address: None,
            device_name: None,
            device_model: None,
            device_os_version: None,
            app_version: None,
            device_token: "tok".to_string(),
            status,
            display_id,
            organization_id: Some(1),
            notes: None,
            authorized_by: None,
            authorized_at: None,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
            display_identifier: None,
            display_name: None,
            display_is_active: None,
        }
    }

    #[test]
    fn content_requires_authorization() {
        for status in [DeviceStatus::Pending, DeviceStatus::Rejected, DeviceStatus::Revoked] {
            let err = require_playable(&device(status, Some(1))).unwrap_err();
            assert!(matches!(err, AppError::PermissionDenied(_)));
        }
    }

    #[test]
    fn content_requires_a_display() {
        assert!(require_playable(&device(DeviceStatus::Authorized, None)).is_err());
        assert_eq!(
            require_playable(&device(DeviceStatus::Authorized, Some(5))).unwrap(),
            5
        );
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        let blank = "  ".to_string();
        let name = " TV 1 ".to_string();
        assert_eq!(trimmed(Some(&blank)), None);
        assert_eq!(trimmed(Some(&name)), Some("TV 1"));
        assert_eq!(trimmed(None), None);
    }
}
