//! Media library: multipart uploads stored on local disk.

use std::path::Path;
use std::sync::Arc;

use axum::Extension;
use axum::extract::{Multipart, State};
use serde::Deserialize;
use signage_core::{AppError, AuthInfo, permissions as perm};
use signage_db::{CreateMediaParams, Media, Page};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::permissions::require_permission;
use crate::core::{ApiResponse, Pagination, PathParam, QueryParams, ServiceContext};

/// Public URL prefix under which stored files are served.
pub const URL_PREFIX: &str = "/uploads";

const DEFAULT_LIMIT: u32 = 50;

const ALLOWED_PREFIXES: &[&str] = &["image/", "video/", "audio/"];

const ALLOWED_DOCUMENTS: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Types under an allowed prefix that a browser would run as a document.
const SCRIPTABLE_TYPES: &[&str] = &["image/svg+xml"];

/// Extensions `/uploads` would serve as an active document.
const SCRIPTABLE_EXTENSIONS: &[&str] = &["svg", "svgz", "htm", "html", "xhtml", "xml", "js", "mjs"];

#[must_use]
pub fn is_allowed_mime(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    if SCRIPTABLE_TYPES.contains(&mime.as_str()) {
        return false;
    }
    ALLOWED_PREFIXES.iter().any(|p| mime.starts_with(p))
        || ALLOWED_DOCUMENTS.contains(&mime.as_str())
}

/// Random storage name keeping a sanitized extension of the original.
fn storage_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .filter(|e| !SCRIPTABLE_EXTENSIONS.contains(&e.as_str()));

    match ext {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4().simple()),
        None => Uuid::new_v4().simple().to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// MIME prefix filter, e.g. `image` or `video/mp4`.
    pub mime_type: Option<String>,
}

/// A file received from the client, not yet persisted.
struct Upload {
    original_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct MediaService {
    ctx: Arc<ServiceContext>,
}

impl MediaService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    async fn store(&self, auth: &AuthInfo, upload: Upload) -> Result<Media, AppError> {
        require_permission(&self.ctx, auth, &[perm::MEDIA_UPLOAD]).await?;
        if !is_allowed_mime(&upload.mime_type) {
            return Err(AppError::invalid(format!(
                "File type not allowed: {}",
                upload.mime_type
            )));
        }

        let settings = self.ctx.uploads();
        let filename = storage_name(&upload.original_name);
        tokio::fs::create_dir_all(&settings.dir)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot create upload dir: {e}")))?;
        let path = settings.dir.join(&filename);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot store upload: {e}")))?;

        let url = format!("{URL_PREFIX}/{filename}");
        let size = i64::try_from(upload.bytes.len()).unwrap_or(i64::MAX);
        let created = self
            .ctx
            .db()
            .media
            .create(CreateMediaParams {
                filename: &filename,
                original_name: &upload.original_name,
                mime_type: &upload.mime_type,
                size,
                url: &url,
                uploaded_by: auth.user_id,
                organization_id: auth.organization_id,
            })
            .await;

        match created {
            Ok(media) => {
                info!(media_id = media.id, size, mime = %media.mime_type, "Media uploaded");
                Ok(media)
            }
            Err(e) => {
                if let Err(io) = tokio::fs::remove_file(&path).await {
                    warn!(error = %io, file = %filename, "Failed to remove orphaned upload");
                }
                Err(e)
            }
        }
    }

    pub async fn list(
        &self,
        auth: &AuthInfo,
        query: MediaListQuery,
    ) -> Result<(Vec<Media>, Pagination), AppError> {
        require_permission(&self.ctx, auth, &[perm::MEDIA_READ]).await?;
        let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
        let mime = query.mime_type.as_deref().map(str::trim).filter(|m| !m.is_empty());
        let (items, total) = self.ctx.db().media.list(auth.org_scope(), mime, page).await?;
        Ok((items, Pagination::new(page, total)))
    }

    pub async fn get(&self, auth: &AuthInfo, id: i32) -> Result<Media, AppError> {
        require_permission(&self.ctx, auth, &[perm::MEDIA_READ]).await?;
        let media = self.ctx.db().media.get(id).await?;
        auth.require_org(media.organization_id, "media")?;
        Ok(media)
    }

    pub async fn delete(&self, auth: &AuthInfo, id: i32) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, &[perm::MEDIA_DELETE]).await?;
        let db = self.ctx.db();
        let media = db.media.get(id).await?;
        auth.require_org(media.organization_id, "media")?;

        let posts = db.media.count_referencing_posts(id).await?;
        if posts > 0 {
            return Err(AppError::invalid(format!(
                "Cannot delete media: {posts} post(s) still use it"
            )));
        }

        db.media.delete(id).await?;

        let path = self.ctx.uploads().dir.join(&media.filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(error = %e, file = %media.filename, "Stored file already gone");
        }

        info!(media_id = id, by = auth.user_id, "Media deleted");
        Ok(())
    }
}

/// Pull the `file` part out of the multipart body, enforcing the size cap.
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::invalid(e.body_text()))?
        {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the {max_bytes} byte limit"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(AppError::invalid("Uploaded file is empty"));
        }
        return Ok(Upload {
            original_name,
            mime_type,
            bytes,
        });
    }

    Err(AppError::invalid("No file uploaded"))
}

// ============================================================================
// Handlers
// ============================================================================

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn upload(
    State(svc): State<MediaService>,
    Extension(auth): Extension<AuthInfo>,
    multipart: Multipart,
) -> Result<ApiResponse<Media>, AppError> {
    let upload = read_upload(multipart, svc.ctx.uploads().max_bytes).await?;
    let media = svc.store(&auth, upload).await?;
    Ok(ApiResponse::created(media).with_message("File uploaded successfully"))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn list(
    State(svc): State<MediaService>,
    Extension(auth): Extension<AuthInfo>,
    QueryParams(query): QueryParams<MediaListQuery>,
) -> Result<ApiResponse<Vec<Media>>, AppError> {
    let (items, pagination) = svc.list(&auth, query).await?;
    Ok(ApiResponse::ok(items).with_pagination(pagination))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<MediaService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<Media>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, id).await?))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn delete(
    State(svc): State<MediaService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<()>, AppError> {
    svc.delete(&auth, id).await?;
    Ok(ApiResponse::message("Media deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_types_are_allow_listed() {
        assert!(is_allowed_mime("image/png"));
        assert!(is_allowed_mime("video/mp4"));
        assert!(is_allowed_mime("audio/mpeg"));
        assert!(is_allowed_mime("application/pdf"));
        assert!(is_allowed_mime("Application/PDF"));
        assert!(is_allowed_mime(
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        ));
    }

    #[test]
    fn executable_and_script_types_are_refused() {
        assert!(!is_allowed_mime("application/x-msdownload"));
        assert!(!is_allowed_mime("text/html"));
        assert!(!is_allowed_mime("application/octet-stream"));
        assert!(!is_allowed_mime(""));
    }

    #[test]
    fn svg_is_refused_despite_the_image_prefix() {
        assert!(!is_allowed_mime("image/svg+xml"));
        assert!(!is_allowed_mime(" IMAGE/SVG+XML "));
    }

    #[test]
    fn scriptable_extensions_are_not_stored() {
        assert!(!storage_name("banner.svg").contains('.'));
        assert!(!storage_name("page.HTML").contains('.'));
        assert!(storage_name("clip.mp4").ends_with(".mp4"));
    }

    #[test]
    fn storage_name_keeps_a_safe_extension() {
        let name = storage_name("Holiday Photo.JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 32 + 4);

        let name = storage_name("../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains('.'));
    }

    #[test]
    fn storage_name_drops_odd_extensions() {
        assert!(!storage_name("clip.mp4;rm").contains(';'));
        assert_eq!(storage_name("noext").len(), 32);
    }
}
