//! System administration: cache inspection and flushing.

use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use signage_core::{AppError, AuthInfo, permissions as perm};
use tracing::{info, instrument};

use super::permissions::{require_permission, require_super_admin};
use crate::core::{ApiResponse, CacheStats, ServiceContext};

#[derive(Clone)]
pub struct SystemService {
    ctx: Arc<ServiceContext>,
}

impl SystemService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    pub async fn cache_stats(&self, auth: &AuthInfo) -> Result<CacheStats, AppError> {
        require_permission(&self.ctx, auth, &[perm::SYSTEM_SETTINGS, perm::SETTINGS_READ]).await?;
        Ok(self.ctx.cache().stats().await)
    }

    pub async fn flush_cache(&self, auth: &AuthInfo) -> Result<(), AppError> {
        require_super_admin(auth)?;
        self.ctx.cache().flush().await;
        info!(by = auth.user_id, "Cache flushed");
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn cache_stats(
    State(svc): State<SystemService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<CacheStats>, AppError> {
    Ok(ApiResponse::ok(svc.cache_stats(&auth).await?))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn flush_cache(
    State(svc): State<SystemService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<()>, AppError> {
    svc.flush_cache(&auth).await?;
    Ok(ApiResponse::message("Cache flushed"))
}
