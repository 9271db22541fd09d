//! Licence pools for authorized devices and displays.
//!
//! Seat-consuming writes take a transaction-scoped advisory lock for their
//! pool, count the seats in use and write in the same transaction. Writers
//! on the same pool are therefore serialized and the count cannot go stale
//! between the check and the write.

use signage_core::AppError;
use sqlx::{Postgres, Transaction};

use crate::DbError;

/// Advisory lock class shared by all licence pools.
const LOCK_CLASS: i32 = 0x5347;

/// What a licence seat is spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicencePool {
    Devices,
    Displays,
}

/// A seat request: the pool owner (`None` counts every row) and the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LicenceSeat {
    pub organization_id: Option<i32>,
    pub cap: i64,
}

impl LicencePool {
    const fn lock_key(self) -> i32 {
        match self {
            Self::Devices => 1,
            Self::Displays => 2,
        }
    }

    /// Refuse another seat once `used` reached `cap`.
    pub fn check(self, used: i64, cap: i64) -> Result<(), AppError> {
        if used < cap {
            return Ok(());
        }
        Err(AppError::forbidden(match self {
            Self::Devices => {
                format!("Licence limit reached: {used} of {cap} devices authorized")
            }
            Self::Displays => format!("Display licence limit reached ({used}/{cap})"),
        }))
    }

    /// Lock the pool for the rest of `tx`.
    ///
    /// Every pool of a kind shares one lock: the unscoped pool counts rows of
    /// all organizations, so per-organization locks would not cover it.
    pub(crate) async fn lock(self, tx: &mut Transaction<'_, Postgres>) -> Result<(), AppError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(LOCK_CLASS)
            .bind(self.lock_key())
            .execute(&mut **tx)
            .await
            .map_err(DbError)?;
        Ok(())
    }

    /// Lock the pool, then fail if `seat` cannot be granted.
    pub(crate) async fn reserve(
        self,
        tx: &mut Transaction<'_, Postgres>,
        seat: LicenceSeat,
    ) -> Result<(), AppError> {
        self.lock(tx).await?;
        let used = sqlx::query_scalar::<_, i64>(self.count_sql())
            .bind(seat.organization_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(DbError)?;
        self.check(used, seat.cap)
    }

    /// Seats in use. `$1` is the owning organization, or NULL for all rows.
    pub(crate) const fn count_sql(self) -> &'static str {
        match self {
            Self::Devices => {
                "SELECT COUNT(*) FROM device_registrations
                  WHERE status = 'authorized'
                    AND ($1::int IS NULL OR organization_id = $1)"
            }
            Self::Displays => {
                "SELECT COUNT(*) FROM displays
                  WHERE ($1::int IS NULL OR organization_id = $1)"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_exclusive_at_cap() {
        assert!(LicencePool::Devices.check(0, 2).is_ok());
        assert!(LicencePool::Devices.check(1, 2).is_ok());
        let err = LicencePool::Devices.check(2, 2).unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        assert!(err.to_string().contains("2 of 2"));
    }

    #[test]
    fn display_pool_reports_usage() {
        let err = LicencePool::Displays.check(5, 5).unwrap_err();
        assert!(err.to_string().contains("(5/5)"));
    }

    #[test]
    fn zero_cap_refuses_every_seat() {
        assert!(LicencePool::Displays.check(0, 0).is_err());
    }

    #[test]
    fn unscoped_pools_count_every_organization() {
        for pool in [LicencePool::Devices, LicencePool::Displays] {
            let sql = pool.count_sql();
            assert!(sql.contains("$1::int IS NULL OR organization_id = $1"));
            assert!(!sql.contains("IS NOT DISTINCT FROM"));
        }
    }

    #[test]
    fn pools_lock_independently() {
        assert_ne!(LicencePool::Devices.lock_key(), LicencePool::Displays.lock_key());
    }
}
