//! Displays: named screens that posts are scheduled onto.

use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use signage_core::validation::{require_non_empty, validate_identifier};
use signage_core::{AppError, AuthInfo, permissions as perm};
use signage_db::{
    CreateDisplayParams, Display, DisplayWithStats, LicenceSeat, Post, UpdateDisplayParams,
};
use tracing::{info, instrument};

use super::permissions::require_permission;
use crate::core::{
    ApiResponse, JsonBody, PathParam, QueryParams, ServiceContext, cache_keys, schedule,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisplayRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub show_transit_data: Option<bool>,
    pub show_traffic_data: Option<bool>,
    pub organization_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDisplayRequest {
    pub name: Option<String>,
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub show_transit_data: Option<bool>,
    pub show_traffic_data: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPostsQuery {
    pub is_active: Option<bool>,
}

/// Display summary sent alongside its playlist.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub id: i32,
    pub name: String,
    pub identifier: String,
    pub show_transit_data: bool,
    pub show_traffic_data: bool,
}

impl From<&Display> for DisplayInfo {
    fn from(d: &Display) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            identifier: d.identifier.clone(),
            show_transit_data: d.show_transit_data,
            show_traffic_data: d.show_traffic_data,
        }
    }
}

/// What a screen should play right now.
#[derive(Debug, Serialize)]
pub struct Playlist {
    pub display: DisplayInfo,
    pub count: usize,
    pub posts: Vec<Post>,
}

/// The scheduled playlist for a display at this moment.
pub async fn playlist(ctx: &ServiceContext, display: &Display) -> Result<Playlist, AppError> {
    let candidates = ctx
        .db()
        .posts
        .candidates_for_display(display.id, display.organization_id)
        .await?;
    let posts = schedule::select(candidates, Some(display.id), Utc::now());
    Ok(Playlist {
        display: DisplayInfo::from(display),
        count: posts.len(),
        posts,
    })
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("Serialization failed: {e}")))
}

#[derive(Clone)]
pub struct DisplayService {
    ctx: Arc<ServiceContext>,
}

impl DisplayService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    pub async fn list(&self, auth: &AuthInfo) -> Result<Vec<DisplayWithStats>, AppError> {
        require_permission(&self.ctx, auth, &[perm::DISPLAYS_READ]).await?;
        self.ctx.db().displays.list_with_stats(auth.org_scope()).await
    }

    pub async fn get(&self, auth: &AuthInfo, id: i32) -> Result<Display, AppError> {
        require_permission(&self.ctx, auth, &[perm::DISPLAYS_READ]).await?;
        let display = self.ctx.db().displays.get(id).await?;
        auth.require_org(display.organization_id, "display")?;
        Ok(display)
    }

    /// Active display by identifier; inactive screens are refused.
    pub async fn get_by_identifier(&self, identifier: &str) -> Result<Display, AppError> {
        let display = self.ctx.db().displays.get_by_identifier(identifier).await?;
        if !display.is_active {
            return Err(AppError::forbidden("Display is inactive"));
        }
        Ok(display)
    }

    pub async fn create(
        &self,
        auth: &AuthInfo,
        req: CreateDisplayRequest,
    ) -> Result<Display, AppError> {
        require_permission(&self.ctx, auth, &[perm::DISPLAYS_CREATE]).await?;
        require_non_empty("name", &req.name)?;
        require_non_empty("identifier", &req.identifier)?;
        let identifier = req.identifier.trim();
        validate_identifier(identifier)?;

        let organization_id = if auth.is_super_admin() {
            req.organization_id.or(auth.organization_id)
        } else {
            auth.organization_id
        };

        let db = self.ctx.db();
        let org_max = match organization_id {
            Some(id) => Some(db.organizations.get(id).await?.max_displays),
            None => None,
        };
        let seat = LicenceSeat {
            organization_id,
            cap: self.ctx.licence_cap(org_max),
        };

        if db.displays.identifier_exists(identifier, None).await? {
            return Err(AppError::conflict("Display", "identifier"));
        }

        let display = db
            .displays
            .create(
                CreateDisplayParams {
                    name: req.name.trim(),
                    identifier,
                    description: req.description.as_deref(),
                    is_active: req.is_active.unwrap_or(true),
                    show_transit_data: req.show_transit_data.unwrap_or(true),
                    show_traffic_data: req.show_traffic_data.unwrap_or(true),
                    organization_id,
                },
                seat,
            )
            .await?;

        self.ctx.invalidate(&[cache_keys::DISPLAY_PREFIX]).await;
        let display_id = display.id;
        info!(display_id, identifier, by = auth.user_id, "Display created");
        Ok(display)
    }

    pub async fn update(
        &self,
        auth: &AuthInfo,
        id: i32,
        req: UpdateDisplayRequest,
    ) -> Result<Display, AppError> {
        require_permission(&self.ctx, auth, &[perm::DISPLAYS_UPDATE]).await?;
        let db = self.ctx.db();
        let existing = db.displays.get(id).await?;
        auth.require_org(existing.organization_id, "display")?;

        let name = req.name.as_deref().map(str::trim);
        if let Some(name) = name {
            require_non_empty("name", name)?;
        }
        let identifier = req.identifier.as_deref().map(str::trim);
        if let Some(identifier) = identifier
            && identifier != existing.identifier
        {
            validate_identifier(identifier)?;
            if db.displays.identifier_exists(identifier, Some(id)).await? {
                return Err(AppError::conflict("Display", "identifier"));
            }
        }

        let display = db
            .displays
            .update(
                id,
                UpdateDisplayParams {
                    name,
                    identifier,
                    description: req.description.as_deref(),
                    is_active: req.is_active,
                    show_transit_data: req.show_transit_data,
                    show_traffic_data: req.show_traffic_data,
                },
            )
            .await?;

        self.ctx.invalidate(&[cache_keys::DISPLAY_PREFIX]).await;
        info!(display_id = id, by = auth.user_id, "Display updated");
        Ok(display)
    }

    pub async fn delete(&self, auth: &AuthInfo, id: i32) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, &[perm::DISPLAYS_DELETE]).await?;
        let db = self.ctx.db();
        let existing = db.displays.get(id).await?;
        auth.require_org(existing.organization_id, "display")?;

        let assignments = db.displays.delete(id).await?;
        self.ctx.invalidate(&[cache_keys::DISPLAY_PREFIX]).await;
        info!(
            display_id = id,
            identifier = %existing.identifier,
            assignments,
            by = auth.user_id,
            "Display deleted"
        );
        Ok(())
    }

    /// Posts that target a display, regardless of schedule.
    pub async fn display_posts(
        &self,
        auth: &AuthInfo,
        id: i32,
        is_active: Option<bool>,
    ) -> Result<Vec<Post>, AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_READ]).await?;
        let display = self.get(auth, id).await?;
        let posts = self
            .ctx
            .db()
            .posts
            .candidates_for_display(display.id, display.organization_id)
            .await?;
        Ok(posts
            .into_iter()
            .filter(|p| is_active.is_none_or(|active| p.is_active == active))
            .collect())
    }

    /// Active displays for the public listing.
    pub async fn list_public(&self) -> Result<Value, AppError> {
        let db = self.ctx.db();
        self.ctx
            .cache()
            .wrap(cache_keys::DISPLAYS_LIST, cache_keys::DISPLAYS_LIST_TTL, || async {
                to_json(&db.displays.list_active().await?)
            })
            .await
    }

    pub async fn public_posts(&self, identifier: &str) -> Result<Value, AppError> {
        let key = cache_keys::display_posts(identifier);
        self.ctx
            .cache()
            .wrap(&key, cache_keys::DISPLAY_POSTS_TTL, || async {
                let display = self.get_by_identifier(identifier).await?;
                to_json(&playlist(&self.ctx, &display).await?)
            })
            .await
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn list(
    State(svc): State<DisplayService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<Vec<DisplayWithStats>>, AppError> {
    Ok(ApiResponse::ok(svc.list(&auth).await?))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<DisplayService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<Display>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, id).await?))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn create(
    State(svc): State<DisplayService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<CreateDisplayRequest>,
) -> Result<ApiResponse<Display>, AppError> {
    let display = svc.create(&auth, req).await?;
    Ok(ApiResponse::created(display).with_message("Display created successfully"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn update(
    State(svc): State<DisplayService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<UpdateDisplayRequest>,
) -> Result<ApiResponse<Display>, AppError> {
    let display = svc.update(&auth, id, req).await?;
    Ok(ApiResponse::ok(display).with_message("Display updated successfully"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn delete(
    State(svc): State<DisplayService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<()>, AppError> {
    svc.delete(&auth, id).await?;
    Ok(ApiResponse::message("Display deleted successfully"))
}

#[instrument(skip(svc, auth, query), fields(user_id = auth.user_id))]
pub async fn posts(
    State(svc): State<DisplayService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    QueryParams(query): QueryParams<DisplayPostsQuery>,
) -> Result<ApiResponse<Vec<Post>>, AppError> {
    Ok(ApiResponse::ok(svc.display_posts(&auth, id, query.is_active).await?))
}

#[instrument(skip_all)]
pub async fn public_list(
    State(svc): State<DisplayService>,
) -> Result<ApiResponse<Value>, AppError> {
    Ok(ApiResponse::ok(svc.list_public().await?))
}

#[instrument(skip(svc))]
pub async fn public_get(
    State(svc): State<DisplayService>,
    PathParam(identifier): PathParam<String>,
) -> Result<ApiResponse<DisplayInfo>, AppError> {
    let display = svc.get_by_identifier(&identifier).await?;
    Ok(ApiResponse::ok(DisplayInfo::from(&display)))
}

#[instrument(skip(svc))]
pub async fn public_posts(
    State(svc): State<DisplayService>,
    PathParam(identifier): PathParam<String>,
) -> Result<ApiResponse<Value>, AppError> {
    Ok(ApiResponse::ok(svc.public_posts(&identifier).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> Display {
        let now = Utc::now();
        Display {
            id: 3,
            name: "Lobby".to_string(),
            identifier: "lobby-1".to_string(),
            description: Some("Main entrance".to_string()),
            is_active: true,
            show_transit_data: true,
            show_traffic_data: false,
            organization_id: Some(1),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn display_info_is_camel_case_summary() {
        let json = serde_json::to_value(DisplayInfo::from(&display())).unwrap();
        assert_eq!(json["identifier"], "lobby-1");
        assert_eq!(json["showTransitData"], true);
        assert_eq!(json["showTrafficData"], false);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn update_request_accepts_partial_bodies() {
        let req: UpdateDisplayRequest = serde_json::from_str(r#"{"isActive":false}"#).unwrap();
        assert_eq!(req.is_active, Some(false));
        assert!(req.identifier.is_none());
    }
}
