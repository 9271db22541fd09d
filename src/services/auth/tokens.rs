//! Refresh token rotation.

use signage_core::AppError;
use tracing::{info, warn};

use super::{AuthResponse, AuthService};
use crate::core::TokenGenerator;

impl AuthService {
    /// Exchange a refresh token for a new pair. The old session is consumed.
    pub(super) async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AppError> {
        let hash = TokenGenerator::hash_token(refresh_token);
        let db = self.ctx.db();

        let user_id = db.sessions.consume(&hash).await.inspect_err(|_| {
            warn!("Refresh with unknown or expired token");
        })?;

        let user = db.users.get_by_id(user_id).await.map_err(|_| {
            warn!(user_id, "Refresh for deleted user");
            AppError::token_invalid("refresh token")
        })?;

        if !user.is_active {
            warn!(user_id, "Inactive user attempted token refresh");
            return Err(AppError::Unauthenticated("Account is deactivated".into()));
        }

        let tokens = self.ctx.create_session(&user).await?;
        info!(user_id, "Token refreshed");

        Ok(AuthResponse { user, tokens })
    }
}
