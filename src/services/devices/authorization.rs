//! Admin side of device pairing: listing, state transitions and licence checks.

use signage_core::{AppError, AuthInfo, permissions as perm};
use signage_db::{
    DeviceAction, DeviceRegistration, DeviceStatus, DeviceTransitionParams, Display, LicenceSeat,
    UpdateDeviceParams,
};
use tracing::{info, warn};

use super::{DeviceService, UpdateDeviceRequest, require_device_access};
use crate::services::permissions::require_permission;

const READ: &[&str] = &[perm::DEVICES_READ, perm::DISPLAYS_MANAGE];
const MANAGE: &[&str] = &[perm::DEVICES_MANAGE, perm::DISPLAYS_MANAGE];

/// A device may only play an active display of its own organization.
fn check_display_target(display: &Display, device_org: Option<i32>) -> Result<(), AppError> {
    if display.organization_id != device_org {
        return Err(AppError::forbidden(
            "Display belongs to a different organization than the device",
        ));
    }
    if !display.is_active {
        return Err(AppError::forbidden("Display is inactive"));
    }
    Ok(())
}

impl DeviceService {
    pub(super) async fn list(
        &self,
        auth: &AuthInfo,
        status: Option<DeviceStatus>,
    ) -> Result<Vec<DeviceRegistration>, AppError> {
        require_permission(&self.ctx, auth, READ).await?;
        self.ctx.db().devices.list(auth.org_scope(), status).await
    }

    pub(super) async fn get(
        &self,
        auth: &AuthInfo,
        id: i32,
    ) -> Result<DeviceRegistration, AppError> {
        require_permission(&self.ctx, auth, READ).await?;
        let device = self.ctx.db().devices.get(id).await?;
        require_device_access(auth, &device)?;
        Ok(device)
    }

    /// Load a display the device may be assigned to.
    async fn target_display(
        &self,
        auth: &AuthInfo,
        display_id: i32,
        device_org: Option<i32>,
    ) -> Result<Display, AppError> {
        let display = self.ctx.db().displays.get(display_id).await?;
        auth.require_org(display.organization_id, "display")?;
        check_display_target(&display, device_org)?;
        Ok(display)
    }

    /// Run one admin action through the state machine.
    async fn apply(
        &self,
        auth: &AuthInfo,
        id: i32,
        action: DeviceAction,
        display_id: Option<i32>,
        notes: Option<&str>,
    ) -> Result<DeviceRegistration, AppError> {
        require_permission(&self.ctx, auth, MANAGE).await?;
        let db = self.ctx.db();
        let device = db.devices.get(id).await?;
        require_device_access(auth, &device)?;

        let from = device.status;
        let next = from.apply(action)?;

        // Unclaimed devices join the organization of the admin authorizing them.
        let organization_id = device.organization_id.or(auth.organization_id);
        let display_id = match action {
            DeviceAction::Authorize => display_id.or(device.display_id),
            DeviceAction::Reject | DeviceAction::Revoke => device.display_id,
        };

        let mut seat = None;
        if action == DeviceAction::Authorize {
            if let Some(display_id) = display_id {
                self.target_display(auth, display_id, organization_id).await?;
            }

            if from.needs_licence_seat(next) {
                let org_max = match organization_id {
                    Some(org) => Some(db.organizations.get(org).await?.max_displays),
                    None => None,
                };
                seat = Some(LicenceSeat {
                    organization_id,
                    cap: self.ctx.licence_cap(org_max),
                });
            }
        }

        let updated = db
            .devices
            .transition(
                from,
                DeviceTransitionParams {
                    id,
                    status: next,
                    display_id,
                    organization_id: (action == DeviceAction::Authorize)
                        .then_some(organization_id)
                        .flatten(),
                    notes,
                    actor_id: auth.user_id,
                },
                seat,
            )
            .await
            .inspect_err(|e| {
                if let (AppError::PermissionDenied(_), Some(seat)) = (e, seat) {
                    warn!(device_id = id, organization_id, cap = seat.cap, "Licence limit hit");
                }
            })?;

        info!(
            device_id = id,
            serial_number = %updated.serial_number,
            from = %from,
            to = %next,
            display_id,
            by = auth.user_id,
            "Device {}", action.as_str()
        );
        Ok(updated)
    }

    pub(super) async fn authorize(
        &self,
        auth: &AuthInfo,
        id: i32,
        display_id: Option<i32>,
        notes: Option<&str>,
    ) -> Result<DeviceRegistration, AppError> {
        self.apply(auth, id, DeviceAction::Authorize, display_id, notes).await
    }

    pub(super) async fn reject(
        &self,
        auth: &AuthInfo,
        id: i32,
        notes: Option<&str>,
    ) -> Result<DeviceRegistration, AppError> {
        self.apply(auth, id, DeviceAction::Reject, None, notes).await
    }

    pub(super) async fn revoke(
        &self,
        auth: &AuthInfo,
        id: i32,
        notes: Option<&str>,
    ) -> Result<DeviceRegistration, AppError> {
        self.apply(auth, id, DeviceAction::Revoke, None, notes).await
    }

    pub(super) async fn update(
        &self,
        auth: &AuthInfo,
        id: i32,
        req: UpdateDeviceRequest,
    ) -> Result<DeviceRegistration, AppError> {
        require_permission(&self.ctx, auth, MANAGE).await?;
        let device = self.ctx.db().devices.get(id).await?;
        require_device_access(auth, &device)?;

        if let Some(Some(display_id)) = req.display_id {
            let org = device.organization_id.or(auth.organization_id);
            self.target_display(auth, display_id, org).await?;
        }

        let updated = self
            .ctx
            .db()
            .devices
            .update(
                id,
                UpdateDeviceParams {
                    device_name: req.device_name.as_deref(),
                    display_id: req.display_id,
                    notes: req.notes.as_deref(),
                },
            )
            .await?;

        info!(device_id = id, by = auth.user_id, "Device updated");
        Ok(updated)
    }

    pub(super) async fn delete(&self, auth: &AuthInfo, id: i32) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, MANAGE).await?;
        let device = self.ctx.db().devices.get(id).await?;
        require_device_access(auth, &device)?;

        self.ctx.db().devices.delete(id).await?;
        info!(
            device_id = id,
            serial_number = %device.serial_number,
            by = auth.user_id,
            "Device deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn display(org: Option<i32>, active: bool) -> Display {
        let now = Utc::now();
        Display {
            id: 1,
            name: "Hall".to_string(),
            identifier: "hall".to_string(),
            description: None,
            is_active: active,
            show_transit_data: true,
            show_traffic_data: true,
            organization_id: org,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn display_must_share_the_device_org() {
        assert!(check_display_target(&display(Some(1), true), Some(1)).is_ok());
        assert!(check_display_target(&display(Some(2), true), Some(1)).is_err());
        assert!(check_display_target(&display(None, true), None).is_ok());
    }

    #[test]
    fn inactive_display_cannot_be_assigned() {
        let err = check_display_target(&display(Some(1), false), Some(1)).unwrap_err();
        assert!(err.to_string().contains("inactive"));
    }
}
