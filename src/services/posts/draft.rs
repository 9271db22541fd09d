//! The full field set of a post before it is written.
//!
//! Create requests fill in defaults; update requests merge onto the stored
//! row. Both paths end in [`PostDraft::validate`].

use chrono::{DateTime, Duration, Utc};
use signage_core::AppError;
use signage_core::validation::{clamp_volume, require_non_empty, validate_priority};
use signage_db::{ContentType, CreatePostParams, DisplayMode, Post, UpdatePostParams};

use super::{CreatePostRequest, UpdatePostRequest};

pub const DEFAULT_DURATION_SECS: i32 = 10;
pub const DEFAULT_MUSIC_VOLUME: i32 = 50;
/// Lifetime of a post created without an end date.
pub const DEFAULT_LIFETIME_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub content: Option<String>,
    pub content_type: ContentType,
    pub media_id: Option<i32>,
    pub category_id: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration: i32,
    pub priority: i32,
    pub is_active: bool,
    pub show_title: bool,
    pub display_mode: DisplayMode,
    pub background_music_url: Option<String>,
    pub background_music_volume: i32,
    pub blend_effect: Option<String>,
    pub sound_enabled: bool,
    /// `Some` replaces the assignment set, `None` leaves it alone.
    pub display_ids: Option<Vec<i32>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PostDraft {
    /// Defaults for a new post.
    #[must_use]
    pub fn from_create(req: CreatePostRequest, now: DateTime<Utc>) -> Self {
        let end_date = req.end_date.or_else(|| {
            Some(req.start_date.unwrap_or(now) + Duration::days(DEFAULT_LIFETIME_DAYS))
        });
        let display_ids = match req.display_mode {
            DisplayMode::Specific => Some(req.display_ids.unwrap_or_default()),
            DisplayMode::All => Some(Vec::new()),
        };

        Self {
            title: req.title.trim().to_string(),
            content: req.content,
            content_type: req.content_type,
            media_id: req.media_id,
            category_id: req.category_id,
            start_date: req.start_date,
            end_date,
            duration: req.duration.unwrap_or(DEFAULT_DURATION_SECS),
            priority: req.priority.unwrap_or(0),
            is_active: req.is_active.unwrap_or(true),
            show_title: req.show_title.unwrap_or(true),
            display_mode: req.display_mode,
            background_music_url: non_blank(req.background_music_url),
            background_music_volume: clamp_volume(
                req.background_music_volume.unwrap_or(DEFAULT_MUSIC_VOLUME),
            ),
            blend_effect: req.blend_effect,
            sound_enabled: req.sound_enabled.unwrap_or(false),
            display_ids,
        }
    }

    /// Apply a partial update onto the stored post.
    ///
    /// Switching to video drops background music. Switching to `all` clears
    /// the assignments; in `specific` mode they are replaced only when ids
    /// are supplied.
    #[must_use]
    pub fn merge(existing: &Post, req: UpdatePostRequest) -> Self {
        let content_type = req.content_type.unwrap_or(existing.content_type);
        let display_mode = req.display_mode.unwrap_or(existing.display_mode);

        let background_music_url = if content_type == ContentType::Video {
            None
        } else {
            non_blank(
                req.background_music_url
                    .unwrap_or_else(|| existing.background_music_url.clone()),
            )
        };

        let display_ids = match display_mode {
            DisplayMode::All => (existing.display_mode == DisplayMode::Specific
                || !existing.display_ids.is_empty())
            .then(Vec::new),
            DisplayMode::Specific => req.display_ids,
        };

        Self {
            title: req
                .title
                .map_or_else(|| existing.title.clone(), |t| t.trim().to_string()),
            content: req.content.unwrap_or_else(|| existing.content.clone()),
            content_type,
            media_id: req.media_id.unwrap_or(existing.media_id),
            category_id: req.category_id.unwrap_or(existing.category_id),
            start_date: req.start_date.unwrap_or(existing.start_date),
            end_date: req.end_date.unwrap_or(existing.end_date),
            duration: req.duration.unwrap_or(existing.duration),
            priority: req.priority.unwrap_or(existing.priority),
            is_active: req.is_active.unwrap_or(existing.is_active),
            show_title: req.show_title.unwrap_or(existing.show_title),
            display_mode,
            background_music_url,
            background_music_volume: clamp_volume(
                req.background_music_volume
                    .unwrap_or(existing.background_music_volume),
            ),
            blend_effect: req.blend_effect.unwrap_or_else(|| existing.blend_effect.clone()),
            sound_enabled: req.sound_enabled.unwrap_or(existing.sound_enabled),
            display_ids,
        }
    }

    /// Field rules that do not need the database.
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty("title", &self.title)?;
        validate_priority(self.priority)?;
        if self.duration <= 0 {
            return Err(AppError::invalid("Duration must be a positive number of seconds"));
        }
        if self.content_type == ContentType::Video && self.background_music_url.is_some() {
            return Err(AppError::invalid("Background music is not allowed on video posts"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && end < start
        {
            return Err(AppError::invalid("End date must be after start date"));
        }
        Ok(())
    }

    #[must_use]
    pub fn create_params(
        &self,
        organization_id: Option<i32>,
        created_by: i32,
    ) -> CreatePostParams<'_> {
        CreatePostParams {
            title: &self.title,
            content: self.content.as_deref(),
            content_type: self.content_type,
            media_id: self.media_id,
            category_id: self.category_id,
            organization_id,
            created_by,
            start_date: self.start_date,
            end_date: self.end_date,
            duration: self.duration,
            priority: self.priority,
            is_active: self.is_active,
            show_title: self.show_title,
            display_mode: self.display_mode,
            background_music_url: self.background_music_url.as_deref(),
            background_music_volume: self.background_music_volume,
            blend_effect: self.blend_effect.as_deref(),
            sound_enabled: self.sound_enabled,
            display_ids: self.display_ids.as_deref().unwrap_or(&[]),
        }
    }

    #[must_use]
    pub fn update_params(&self) -> UpdatePostParams<'_> {
        UpdatePostParams {
            title: &self.title,
            content: self.content.as_deref(),
            content_type: self.content_type,
            media_id: self.media_id,
            category_id: self.category_id,
            start_date: self.start_date,
            end_date: self.end_date,
            duration: self.duration,
            priority: self.priority,
            is_active: self.is_active,
            show_title: self.show_title,
            display_mode: self.display_mode,
            background_music_url: self.background_music_url.as_deref(),
            background_music_volume: self.background_music_volume,
            blend_effect: self.blend_effect.as_deref(),
            sound_enabled: self.sound_enabled,
            display_ids: self.display_ids.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn stored() -> Post {
        Post {
            id: 7,
            title: "Welcome".to_string(),
            content: Some("Hello".to_string()),
            content_type: ContentType::Image,
            media_id: Some(2),
            category_id: Some(1),
            organization_id: Some(1),
            created_by: Some(1),
            start_date: None,
            end_date: None,
            duration: 10,
            priority: 20,
            is_active: true,
            show_title: true,
            display_mode: DisplayMode::Specific,
            view_count: 0,
            background_music_url: Some("/uploads/song.mp3".to_string()),
            background_music_volume: 50,
            blend_effect: None,
            sound_enabled: false,
            created_at: now(),
            updated_at: now(),
            display_ids: vec![3, 4],
            category_name: None,
            category_color: None,
            media_url: None,
            media_mime_type: None,
        }
    }

    #[test]
    fn create_fills_defaults() {
        let draft = PostDraft::from_create(
            CreatePostRequest {
                title: "  Menu ".to_string(),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(draft.title, "Menu");
        assert_eq!(draft.duration, DEFAULT_DURATION_SECS);
        assert_eq!(draft.priority, 0);
        assert_eq!(draft.background_music_volume, DEFAULT_MUSIC_VOLUME);
        assert_eq!(draft.end_date, Some(now() + Duration::days(7)));
        assert_eq!(draft.display_ids, Some(Vec::new()));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn default_end_date_counts_from_start() {
        let start = now() + Duration::days(3);
        let draft = PostDraft::from_create(
            CreatePostRequest {
                title: "Later".to_string(),
                start_date: Some(start),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(draft.end_date, Some(start + Duration::days(7)));
    }

    #[test]
    fn volume_is_clamped() {
        let draft = PostDraft::from_create(
            CreatePostRequest {
                title: "Loud".to_string(),
                background_music_volume: Some(250),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(draft.background_music_volume, 100);
    }

    #[test]
    fn invalid_drafts_are_rejected() {
        let base = PostDraft::from_create(
            CreatePostRequest {
                title: "x".to_string(),
                ..Default::default()
            },
            now(),
        );

        let mut draft = base.clone();
        draft.priority = 101;
        assert!(draft.validate().is_err());

        let mut draft = base.clone();
        draft.start_date = Some(now());
        draft.end_date = Some(now() - Duration::hours(1));
        assert!(draft.validate().is_err());

        let mut draft = base.clone();
        draft.content_type = ContentType::Video;
        draft.background_music_url = Some("/uploads/a.mp3".to_string());
        assert!(draft.validate().is_err());

        let mut draft = base;
        draft.title = "   ".to_string();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn merge_keeps_unspecified_fields() {
        let draft = PostDraft::merge(
            &stored(),
            UpdatePostRequest {
                priority: Some(80),
                ..Default::default()
            },
        );
        assert_eq!(draft.priority, 80);
        assert_eq!(draft.title, "Welcome");
        assert_eq!(draft.media_id, Some(2));
        assert_eq!(draft.display_ids, None);
        assert_eq!(draft.background_music_url.as_deref(), Some("/uploads/song.mp3"));
    }

    #[test]
    fn merge_clears_explicit_nulls() {
        let draft = PostDraft::merge(
            &stored(),
            UpdatePostRequest {
                media_id: Some(None),
                content: Some(None),
                ..Default::default()
            },
        );
        assert_eq!(draft.media_id, None);
        assert_eq!(draft.content, None);
    }

    #[test]
    fn switching_to_video_drops_music() {
        let draft = PostDraft::merge(
            &stored(),
            UpdatePostRequest {
                content_type: Some(ContentType::Video),
                ..Default::default()
            },
        );
        assert_eq!(draft.background_music_url, None);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn switching_to_all_clears_assignments() {
        let draft = PostDraft::merge(
            &stored(),
            UpdatePostRequest {
                display_mode: Some(DisplayMode::All),
                display_ids: Some(vec![9]),
                ..Default::default()
            },
        );
        assert_eq!(draft.display_ids, Some(Vec::new()));
    }

    #[test]
    fn specific_mode_replaces_assignments_when_given() {
        let draft = PostDraft::merge(
            &stored(),
            UpdatePostRequest {
                display_ids: Some(vec![5]),
                ..Default::default()
            },
        );
        assert_eq!(draft.display_ids, Some(vec![5]));
    }
}
