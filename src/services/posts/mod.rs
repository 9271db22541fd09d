//! Post service: scheduled content items and their display assignments.
//!
//! Organized by domain:
//! - `mod.rs` — Core types, `PostService`
//! - `draft.rs` — Field merging and validation shared by create and update
//! - `management.rs` — CRUD operations
//! - `ordering.rs` — Bulk priority changes
//! - `handlers.rs` — Thin axum handlers

mod draft;
pub mod handlers;
mod management;
mod ordering;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signage_core::{AppError, AuthInfo};
use signage_db::{ContentType, DisplayMode, PostSort, SortOrder};

use crate::core::{ServiceContext, cache_keys, nullable};

pub use draft::PostDraft;

/// Cache prefixes dropped by every post mutation.
const INVALIDATES: &[&str] = &[cache_keys::POSTS_PREFIX, cache_keys::DISPLAY_PREFIX];

// ============================================================================
// PostService
// ============================================================================

#[derive(Clone)]
pub struct PostService {
    ctx: Arc<ServiceContext>,
}

impl PostService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Category and media references must exist and belong to the caller's tenant.
    async fn check_references(&self, auth: &AuthInfo, draft: &PostDraft) -> Result<(), AppError> {
        let db = self.ctx.db();
        if let Some(category_id) = draft.category_id {
            let category = db.categories.get(category_id).await?;
            auth.require_org(category.organization_id, "category")?;
        }
        if let Some(media_id) = draft.media_id {
            let media = db.media.get(media_id).await?;
            auth.require_org(media.organization_id, "media")?;
        }
        if let Some(display_ids) = draft.display_ids.as_deref()
            && !db.displays.all_in_scope(auth.org_scope(), display_ids).await?
        {
            return Err(AppError::invalid("One or more displays do not exist"));
        }
        Ok(())
    }

    async fn invalidate(&self) {
        self.ctx.invalidate(INVALIDATES).await;
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category_id: Option<i32>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: PostSort,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    pub content: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    pub media_id: Option<i32>,
    pub category_id: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub show_title: Option<bool>,
    #[serde(default)]
    pub display_mode: DisplayMode,
    pub display_ids: Option<Vec<i32>>,
    pub background_music_url: Option<String>,
    pub background_music_volume: Option<i32>,
    pub blend_effect: Option<String>,
    pub sound_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Option<Option<String>>,
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "nullable")]
    pub media_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub duration: Option<i32>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub show_title: Option<bool>,
    pub display_mode: Option<DisplayMode>,
    pub display_ids: Option<Vec<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub background_music_url: Option<Option<String>>,
    pub background_music_volume: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub blend_effect: Option<Option<String>>,
    pub sound_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub ordered_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PriorityChange {
    pub id: i32,
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrioritiesRequest {
    pub priorities: Vec<PriorityChange>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCount {
    pub deleted_count: u64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedCount {
    pub updated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_tells_null_from_absent() {
        let req: UpdatePostRequest =
            serde_json::from_str(r#"{"content":null,"priority":5}"#).unwrap();
        assert_eq!(req.content, Some(None));
        assert_eq!(req.media_id, None);
        assert_eq!(req.priority, Some(5));
    }

    #[test]
    fn list_query_defaults_to_priority_desc() {
        let query: PostListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort, PostSort::Priority);
        assert_eq!(query.order, SortOrder::Desc);

        let query: PostListQuery =
            serde_json::from_str(r#"{"sort":"createdAt","order":"asc"}"#).unwrap();
        assert_eq!(query.sort, PostSort::CreatedAt);
        assert_eq!(query.order, SortOrder::Asc);
    }
}
