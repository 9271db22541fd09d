//! Password change for the signed-in user.

use signage_core::AppError;
use signage_core::validation::validate_password;
use tracing::{info, warn};

use super::{AuthService, ChangePasswordRequest};
use crate::core::password;

impl AuthService {
    pub(super) async fn change_password(
        &self,
        user_id: i32,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let db = self.ctx.db();
        let user = db.users.get_by_id(user_id).await?;

        let Some(current_hash) = user.password.as_deref() else {
            return Err(AppError::invalid(
                "Password login is not enabled for this account",
            ));
        };

        if !password::verify(&req.current_password, current_hash) {
            warn!(user_id, "Password change with wrong current password");
            return Err(AppError::Unauthenticated(
                "Current password is incorrect".into(),
            ));
        }

        validate_password(&req.new_password)?;
        let new_hash = password::hash(&req.new_password)?;
        db.users.set_password(user_id, &new_hash).await?;

        info!(user_id, "Password changed");
        Ok(())
    }
}
