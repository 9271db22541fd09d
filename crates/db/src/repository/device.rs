//! Device registration repository for `device_registrations` operations.
//!
//! Status changes are written with the expected previous status in the
//! `WHERE` clause so concurrent admin actions cannot both succeed.

use signage_core::OrgScope;
use sqlx::postgres::PgPool;

use crate::{
    AppError, DbError, DeviceRegistration, DeviceStatus, DeviceTransitionParams, LicencePool,
    LicenceSeat, RegisterDeviceParams, UpdateDeviceParams,
};

const DEVICE_SELECT: &str = "
    SELECT r.id, r.serial_number, r.mac_address, r.device_name, r.device_model,
           r.device_os_version, r.app_version, r.device_token, r.status, r.display_id,
           r.organization_id, r.notes, r.authorized_by, r.authorized_at, r.last_seen_at,
           r.created_at, r.updated_at,
           d.identifier AS display_identifier, d.name AS display_name,
           d.is_active AS display_is_active
      FROM device_registrations r
      LEFT JOIN displays d ON d.id = r.display_id";

/// Device registration repository.
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i32) -> Result<DeviceRegistration, AppError> {
        sqlx::query_as::<_, DeviceRegistration>(&format!("{DEVICE_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError)?
            .ok_or_else(|| AppError::not_found("Device", id))
    }

    pub async fn find_by_serial(
        &self,
        serial_number: &str,
    ) -> Result<Option<DeviceRegistration>, AppError> {
        sqlx::query_as::<_, DeviceRegistration>(&format!(
            "{DEVICE_SELECT} WHERE r.serial_number = $1"
        ))
        .bind(serial_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<DeviceRegistration>, AppError> {
        sqlx::query_as::<_, DeviceRegistration>(&format!(
            "{DEVICE_SELECT} WHERE r.device_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Insert a new pending registration or refresh the reported info of an
    /// existing one. Status and token of existing rows are preserved.
    ///
    /// Returns the registration and whether it was newly created.
    pub async fn register(
        &self,
        params: RegisterDeviceParams<'_>,
    ) -> Result<(DeviceRegistration, bool), AppError> {
        let (id, created) = sqlx::query_as::<_, (i32, bool)>(
            "INSERT INTO device_registrations (
                serial_number, mac_address, device_name, device_model,
                device_os_version, app_version, device_token, last_seen_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
             ON CONFLICT (serial_number) DO UPDATE SET
                mac_address       = COALESCE(EXCLUDED.mac_address, device_registrations.mac_address),
                device_name       = COALESCE(EXCLUDED.device_name, device_registrations.device_name),
                device_model      = COALESCE(EXCLUDED.device_model, device_registrations.device_model),
                device_os_version = COALESCE(EXCLUDED.device_os_version, device_registrations.device_os_version),
                app_version       = COALESCE(EXCLUDED.app_version, device_registrations.app_version),
                last_seen_at      = NOW(),
                updated_at        = NOW()
             RETURNING id, (xmax = 0) AS created",
        )
        .bind(params.serial_number)
        .bind(params.mac_address)
        .bind(params.device_name)
        .bind(params.device_model)
        .bind(params.device_os_version)
        .bind(params.app_version)
        .bind(params.device_token)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError)?;

        Ok((self.get(id).await?, created))
    }

    /// Record a verification: refresh MAC and `last_seen_at`.
    pub async fn touch(&self, id: i32, mac_address: Option<&str>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE device_registrations
                SET mac_address = COALESCE($2, mac_address),
                    last_seen_at = NOW(),
                    updated_at = NOW()
              WHERE id = $1",
        )
        .bind(id)
        .bind(mac_address)
        .execute(&self.pool)
        .await
        .map_err(DbError)?;
        Ok(())
    }

    /// Heartbeat from a device: refresh `last_seen_at` and optionally the app version.
    pub async fn heartbeat(
        &self,
        id: i32,
        app_version: Option<&str>,
    ) -> Result<DeviceRegistration, AppError> {
        sqlx::query(
            "UPDATE device_registrations
                SET app_version = COALESCE($2, app_version),
                    last_seen_at = NOW()
              WHERE id = $1",
        )
        .bind(id)
        .bind(app_version)
        .execute(&self.pool)
        .await
        .map_err(DbError)?;

        self.get(id).await
    }

    /// Registrations in scope, newest first, optionally by status.
    pub async fn list(
        &self,
        scope: OrgScope,
        status: Option<DeviceStatus>,
    ) -> Result<Vec<DeviceRegistration>, AppError> {
        let (restricted, org) = scope.as_params();
        sqlx::query_as::<_, DeviceRegistration>(&format!(
            "{DEVICE_SELECT}
              WHERE (NOT $1 OR r.organization_id IS NOT DISTINCT FROM $2 OR r.organization_id IS NULL)
                AND ($3::text IS NULL OR r.status = $3)
              ORDER BY r.created_at DESC, r.id DESC"
        ))
        .bind(restricted)
        .bind(org)
        .bind(status.map(DeviceStatus::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Write a status change if the row is still in `from`.
    ///
    /// With a `seat`, the device licence pool is locked and counted in the
    /// same transaction, and a full pool fails with `PermissionDenied`.
    /// Returns `Conflict` when another writer changed the status first.
    pub async fn transition(
        &self,
        from: DeviceStatus,
        params: DeviceTransitionParams<'_>,
        seat: Option<LicenceSeat>,
    ) -> Result<DeviceRegistration, AppError> {
        let mut tx = self.pool.begin().await.map_err(DbError)?;
        if let Some(seat) = seat {
            LicencePool::Devices.reserve(&mut tx, seat).await?;
        }

        let result = sqlx::query(
            "UPDATE device_registrations SET
                status          = $2,
                display_id      = $3,
                organization_id = COALESCE($4, organization_id),
                notes           = COALESCE($5, notes),
                authorized_by   = CASE WHEN $2 = 'authorized' THEN $6 ELSE authorized_by END,
                authorized_at   = CASE WHEN $2 = 'authorized' THEN NOW() ELSE authorized_at END,
                updated_at      = NOW()
              WHERE id = $1 AND status = $7",
        )
        .bind(params.id)
        .bind(params.status.as_str())
        .bind(params.display_id)
        .bind(params.organization_id)
        .bind(params.notes)
        .bind(params.actor_id)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await
        .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Device {} changed state concurrently",
                params.id
            )));
        }
        tx.commit().await.map_err(DbError)?;
        self.get(params.id).await
    }

    pub async fn update(
        &self,
        id: i32,
        params: UpdateDeviceParams<'_>,
    ) -> Result<DeviceRegistration, AppError> {
        let result = sqlx::query(
            "UPDATE device_registrations SET
                device_name = COALESCE($2, device_name),
                display_id  = CASE WHEN $5 THEN $3 ELSE display_id END,
                notes       = COALESCE($4, notes),
                updated_at  = NOW()
              WHERE id = $1",
        )
        .bind(id)
        .bind(params.device_name)
        .bind(params.display_id.flatten())
        .bind(params.notes)
        .bind(params.display_id.is_some())
        .execute(&self.pool)
        .await
        .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Device", id));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM device_registrations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Device", id));
        }
        Ok(())
    }
}
