//! Device authorization state machine.
//!
//! ```text
//!            authorize                revoke
//! pending ─────────────▶ authorized ─────────▶ revoked
//!    │                      ▲  ▲                  │
//!    │ reject               │  └──── authorize ───┘
//!    ▼                      │
//! rejected ─── authorize ───┘
//! ```
//!
//! `authorize` on an already authorized device is a reassignment and keeps
//! the state.

use signage_core::AppError;

use crate::DeviceStatus;

/// Admin action on a device registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    Authorize,
    Reject,
    Revoke,
}

impl DeviceAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::Reject => "reject",
            Self::Revoke => "revoke",
        }
    }
}

impl DeviceStatus {
    /// Next state for `action`, or `Conflict` when the move is not allowed.
    pub fn apply(self, action: DeviceAction) -> Result<Self, AppError> {
        use DeviceAction as A;
        use DeviceStatus as S;

        match (self, action) {
            (S::Pending | S::Rejected | S::Revoked | S::Authorized, A::Authorize) => {
                Ok(S::Authorized)
            }
            (S::Pending, A::Reject) => Ok(S::Rejected),
            (S::Authorized, A::Revoke) => Ok(S::Revoked),
            (from, action) => Err(AppError::Conflict(format!(
                "Cannot {} a device in state '{from}'",
                action.as_str()
            ))),
        }
    }

    /// Whether entering this state from `self` consumes a licence seat.
    #[must_use]
    pub const fn needs_licence_seat(self, next: Self) -> bool {
        matches!(next, Self::Authorized) && !matches!(self, Self::Authorized)
    }

    #[inline]
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// Human-readable hint returned to the device while it waits.
    #[must_use]
    pub const fn device_message(self) -> &'static str {
        match self {
            Self::Pending => "Device is awaiting authorization by an administrator",
            Self::Authorized => "Device is authorized",
            Self::Rejected => "Device registration was rejected",
            Self::Revoked => "Device authorization was revoked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_authorized_or_rejected() {
        assert_eq!(
            DeviceStatus::Pending.apply(DeviceAction::Authorize).unwrap(),
            DeviceStatus::Authorized
        );
        assert_eq!(
            DeviceStatus::Pending.apply(DeviceAction::Reject).unwrap(),
            DeviceStatus::Rejected
        );
        assert!(DeviceStatus::Pending.apply(DeviceAction::Revoke).is_err());
    }

    #[test]
    fn only_authorized_devices_can_be_revoked() {
        assert_eq!(
            DeviceStatus::Authorized.apply(DeviceAction::Revoke).unwrap(),
            DeviceStatus::Revoked
        );
        assert!(DeviceStatus::Rejected.apply(DeviceAction::Revoke).is_err());
        assert!(DeviceStatus::Revoked.apply(DeviceAction::Revoke).is_err());
    }

    #[test]
    fn rejected_and_revoked_can_be_reauthorized() {
        assert!(DeviceStatus::Rejected.apply(DeviceAction::Authorize).is_ok());
        assert!(DeviceStatus::Revoked.apply(DeviceAction::Authorize).is_ok());
    }

    #[test]
    fn reject_after_authorization_is_a_conflict() {
        let err = DeviceStatus::Authorized
            .apply(DeviceAction::Reject)
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.to_string().contains("authorized"));
    }

    #[test]
    fn reassignment_does_not_take_a_new_seat() {
        assert!(DeviceStatus::Pending.needs_licence_seat(DeviceStatus::Authorized));
        assert!(DeviceStatus::Revoked.needs_licence_seat(DeviceStatus::Authorized));
        assert!(!DeviceStatus::Authorized.needs_licence_seat(DeviceStatus::Authorized));
        assert!(!DeviceStatus::Pending.needs_licence_seat(DeviceStatus::Rejected));
    }
}
