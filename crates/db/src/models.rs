//! Database models and parameter types for the signage schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signage_core::{JwtSubject, OrgScope, UnknownVariant, UserRole};
use sqlx::FromRow;

/// Declares a text-backed enum with `as_str`, `Display`, `FromStr` and
/// `TryFrom<String>` (used by `#[sqlx(try_from = "String")]`).
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Returns the string representation as stored in the database.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

text_enum!(
    /// Authorization state of a paired device.
    DeviceStatus, "device status" {
        Pending => "pending",
        Authorized => "authorized",
        Rejected => "rejected",
        Revoked => "revoked",
    }
);

text_enum!(
    /// Whether a post targets every display or an explicit subset.
    DisplayMode, "display mode" {
        All => "all",
        Specific => "specific",
    }
);

text_enum!(
    /// Post content kind.
    ContentType, "content type" {
        Text => "text",
        Image => "image",
        Video => "video",
        Html => "html",
        Presentation => "presentation",
        Pdf => "pdf",
        Word => "word",
    }
);

text_enum!(
    /// Value type of a setting row.
    SettingType, "setting type" {
        String => "string",
        Number => "number",
        Boolean => "boolean",
        Json => "json",
    }
);

text_enum!(
    /// Origin of a user account.
    SsoProvider, "sso provider" {
        Local => "local",
        AzureAd => "azure_ad",
        Ldap => "ldap",
    }
);

impl Default for DisplayMode {
    fn default() -> Self {
        Self::All
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Text
    }
}

// =============================================================================
// Database models
// =============================================================================

/// Tenant from `organizations`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub is_active: bool,
    pub max_users: i32,
    pub max_displays: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User from `users`. The password hash is never serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub is_active: bool,
    pub organization_id: Option<i32>,
    #[serde(skip_serializing)]
    pub azure_ad_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub sso_provider: SsoProvider,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JwtSubject for User {
    fn user_id(&self) -> i32 {
        self.id
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn role(&self) -> UserRole {
        self.role
    }

    fn organization_id(&self) -> Option<i32> {
        self.organization_id
    }
}

/// Per-user permission override from `user_permissions`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermission {
    pub user_id: i32,
    pub permission: String,
    pub granted: bool,
    pub created_at: DateTime<Utc>,
}

/// Post category from `categories`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub organization_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Uploaded file metadata from `media`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: i32,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub uploaded_by: Option<i32>,
    pub organization_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Screen from `displays`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub id: i32,
    pub name: String,
    pub identifier: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub show_transit_data: bool,
    pub show_traffic_data: bool,
    pub organization_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display with assignment counters for admin listings.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayWithStats {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub display: Display,
    pub assigned_posts: i64,
    pub authorized_devices: i64,
}

/// Post with its display assignments and joined category/media summary.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: Option<String>,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub media_id: Option<i32>,
    pub category_id: Option<i32>,
    pub organization_id: Option<i32>,
    pub created_by: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration: i32,
    pub priority: i32,
    pub is_active: bool,
    pub show_title: bool,
    #[sqlx(try_from = "String")]
    pub display_mode: DisplayMode,
    pub view_count: i32,
    pub background_music_url: Option<String>,
    pub background_music_volume: i32,
    pub blend_effect: Option<String>,
    pub sound_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub display_ids: Vec<i32>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub media_url: Option<String>,
    pub media_mime_type: Option<String>,
}

/// Device pairing record from `device_registrations`, joined with its display.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub id: i32,
    pub serial_number: String,
    pub mac_address: Option<String>,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub device_os_version: Option<String>,
    pub app_version: Option<String>,
    #[serde(skip_serializing)]
    pub device_token: String,
    #[sqlx(try_from = "String")]
    pub status: DeviceStatus,
    pub display_id: Option<i32>,
    pub organization_id: Option<i32>,
    pub notes: Option<String>,
    pub authorized_by: Option<i32>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub display_identifier: Option<String>,
    pub display_name: Option<String>,
    pub display_is_active: Option<bool>,
}

impl DeviceRegistration {
    /// Identifier of the assigned display, only while that display is active.
    #[must_use]
    pub fn active_display_identifier(&self) -> Option<&str> {
        match self.display_is_active {
            Some(true) => self.display_identifier.as_deref(),
            _ => None,
        }
    }
}

/// Key-value setting from `settings`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub category: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result from consuming an OAuth state row.
#[derive(Debug, Clone, FromRow)]
pub struct ConsumedOAuthState {
    pub code_verifier: String,
    pub redirect_to: Option<String>,
}

// =============================================================================
// Parameter types (borrow from caller)
// =============================================================================

/// Page window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 500;

    /// Build a page window, clamping out-of-range inputs.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit
                .filter(|l| *l > 0)
                .unwrap_or(default_limit)
                .min(Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    #[must_use]
    pub const fn total_pages(self, total: i64) -> i64 {
        let limit = self.limit as i64;
        (total + limit - 1) / limit
    }
}

/// Parameters for creating an organization.
#[derive(Debug, Clone, Copy)]
pub struct CreateOrganizationParams<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub logo_url: Option<&'a str>,
    pub primary_color: Option<&'a str>,
    pub max_users: i32,
    pub max_displays: i32,
}

/// Parameters for updating an organization (`None` keeps the value).
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOrganizationParams<'a> {
    pub name: Option<&'a str>,
    pub logo_url: Option<&'a str>,
    pub primary_color: Option<&'a str>,
    pub is_active: Option<bool>,
    pub max_users: Option<i32>,
    pub max_displays: Option<i32>,
}

/// Parameters for creating a user.
#[derive(Debug, Clone, Copy)]
pub struct CreateUserParams<'a> {
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub role: UserRole,
    pub organization_id: Option<i32>,
    pub azure_ad_id: Option<&'a str>,
    pub sso_provider: SsoProvider,
}

/// Parameters for updating a user (`None` keeps the value).
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateUserParams<'a> {
    pub email: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub organization_id: Option<i32>,
}

/// Filters for listing users.
#[derive(Debug, Clone, Copy)]
pub struct UserListParams<'a> {
    pub scope: OrgScope,
    pub include_super_admins: bool,
    pub search: Option<&'a str>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub page: Page,
}

/// Parameters for creating a category.
#[derive(Debug, Clone, Copy)]
pub struct CreateCategoryParams<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub icon: Option<&'a str>,
    pub sort_order: i32,
    pub organization_id: Option<i32>,
}

/// Parameters for updating a category (`None` keeps the value).
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateCategoryParams<'a> {
    pub name: Option<&'a str>,
    pub color: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Parameters for recording an uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct CreateMediaParams<'a> {
    pub filename: &'a str,
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
    pub url: &'a str,
    pub uploaded_by: i32,
    pub organization_id: Option<i32>,
}

/// Parameters for creating a display.
#[derive(Debug, Clone, Copy)]
pub struct CreateDisplayParams<'a> {
    pub name: &'a str,
    pub identifier: &'a str,
    pub description: Option<&'a str>,
    pub is_active: bool,
    pub show_transit_data: bool,
    pub show_traffic_data: bool,
    pub organization_id: Option<i32>,
}

/// Parameters for updating a display (`None` keeps the value).
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateDisplayParams<'a> {
    pub name: Option<&'a str>,
    pub identifier: Option<&'a str>,
    pub description: Option<&'a str>,
    pub is_active: Option<bool>,
    pub show_transit_data: Option<bool>,
    pub show_traffic_data: Option<bool>,
}

/// Sort key for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostSort {
    #[default]
    Priority,
    CreatedAt,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filters for listing posts.
#[derive(Debug, Clone, Copy)]
pub struct PostListParams<'a> {
    pub scope: OrgScope,
    pub category_id: Option<i32>,
    pub is_active: Option<bool>,
    pub search: Option<&'a str>,
    pub sort: PostSort,
    pub order: SortOrder,
    pub page: Page,
}

/// Full post field set written on create.
#[derive(Debug, Clone)]
pub struct CreatePostParams<'a> {
    pub title: &'a str,
    pub content: Option<&'a str>,
    pub content_type: ContentType,
    pub media_id: Option<i32>,
    pub category_id: Option<i32>,
    pub organization_id: Option<i32>,
    pub created_by: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration: i32,
    pub priority: i32,
    pub is_active: bool,
    pub show_title: bool,
    pub display_mode: DisplayMode,
    pub background_music_url: Option<&'a str>,
    pub background_music_volume: i32,
    pub blend_effect: Option<&'a str>,
    pub sound_enabled: bool,
    pub display_ids: &'a [i32],
}

/// Full post field set written on update (the service merges partial input).
#[derive(Debug, Clone)]
pub struct UpdatePostParams<'a> {
    pub title: &'a str,
    pub content: Option<&'a str>,
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
    pub background_music_url: Option<&'a str>,
    pub background_music_volume: i32,
    pub blend_effect: Option<&'a str>,
    pub sound_enabled: bool,
    /// `Some` replaces the assignment set; `None` leaves it untouched.
    pub display_ids: Option<&'a [i32]>,
}

/// Device-reported fields on registration.
#[derive(Debug, Clone, Copy)]
pub struct RegisterDeviceParams<'a> {
    pub serial_number: &'a str,
    pub mac_address: Option<&'a str>,
    pub device_name: Option<&'a str>,
    pub device_model: Option<&'a str>,
    pub device_os_version: Option<&'a str>,
    pub app_version: Option<&'a str>,
    pub device_token: &'a str,
}

/// Status change written by an admin transition.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTransitionParams<'a> {
    pub id: i32,
    pub status: DeviceStatus,
    pub display_id: Option<i32>,
    pub organization_id: Option<i32>,
    pub notes: Option<&'a str>,
    pub actor_id: i32,
}

/// Admin edits to a device (`None` keeps the value).
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateDeviceParams<'a> {
    pub device_name: Option<&'a str>,
    /// `Some(None)` clears the assignment.
    pub display_id: Option<Option<i32>>,
    pub notes: Option<&'a str>,
}

/// Upsert of a single setting.
#[derive(Debug, Clone, Copy)]
pub struct UpsertSettingParams<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub setting_type: SettingType,
    pub category: &'a str,
    pub description: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_round_trip_through_strings() {
        assert_eq!("authorized".parse::<DeviceStatus>().unwrap(), DeviceStatus::Authorized);
        assert_eq!(DeviceStatus::Revoked.as_str(), "revoked");
        assert_eq!(SsoProvider::AzureAd.to_string(), "azure_ad");
        assert!(ContentType::try_from("gif".to_string()).is_err());
    }

    #[test]
    fn page_window_defaults_and_clamps() {
        let page = Page::new(None, None, 20);
        assert_eq!((page.page, page.limit), (1, 20));
        assert_eq!(page.offset(), 0);

        let page = Page::new(Some(3), Some(10_000), 100);
        assert_eq!(page.limit, Page::MAX_LIMIT);
        assert_eq!(page.offset(), 2 * i64::from(Page::MAX_LIMIT));

        let page = Page::new(Some(0), Some(0), 100);
        assert_eq!((page.page, page.limit), (1, 100));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::new(Some(1), Some(20), 20);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(20), 1);
        assert_eq!(page.total_pages(21), 2);
    }
}
