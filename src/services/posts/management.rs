//! Post CRUD operations.

use chrono::Utc;
use signage_core::{AppError, AuthInfo, permissions as perm};
use signage_db::{Page, Post, PostListParams};
use tracing::info;

use super::{CreatePostRequest, PostDraft, PostListQuery, PostService, UpdatePostRequest};
use crate::core::Pagination;
use crate::services::permissions::require_permission;

/// Default page size of the admin post list.
const DEFAULT_LIMIT: u32 = 100;

impl PostService {
    pub(super) async fn list(
        &self,
        auth: &AuthInfo,
        query: &PostListQuery,
    ) -> Result<(Vec<Post>, Pagination), AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_READ]).await?;

        let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let (posts, total) = self
            .ctx
            .db()
            .posts
            .list(PostListParams {
                scope: auth.org_scope(),
                category_id: query.category_id,
                is_active: query.is_active,
                search,
                sort: query.sort,
                order: query.order,
                page,
            })
            .await?;

        Ok((posts, Pagination::new(page, total)))
    }

    pub(super) async fn get(&self, auth: &AuthInfo, id: i32) -> Result<Post, AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_READ]).await?;
        let post = self.ctx.db().posts.get(id).await?;
        auth.require_org(post.organization_id, "post")?;
        Ok(post)
    }

    pub(super) async fn create(
        &self,
        auth: &AuthInfo,
        req: CreatePostRequest,
    ) -> Result<Post, AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_CREATE]).await?;

        let draft = PostDraft::from_create(req, Utc::now());
        draft.validate()?;
        self.check_references(auth, &draft).await?;

        let post = self
            .ctx
            .db()
            .posts
            .create(draft.create_params(auth.organization_id, auth.user_id))
            .await?;

        self.invalidate().await;
        info!(
            post_id = post.id,
            mode = %post.display_mode,
            displays = post.display_ids.len(),
            by = auth.user_id,
            "Post created"
        );
        Ok(post)
    }

    pub(super) async fn update(
        &self,
        auth: &AuthInfo,
        id: i32,
        req: UpdatePostRequest,
    ) -> Result<Post, AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_UPDATE]).await?;
        let existing = self.ctx.db().posts.get(id).await?;
        auth.require_org(existing.organization_id, "post")?;

        let draft = PostDraft::merge(&existing, req);
        draft.validate()?;
        self.check_references(auth, &draft).await?;

        let post = self.ctx.db().posts.update(id, draft.update_params()).await?;

        self.invalidate().await;
        info!(post_id = id, by = auth.user_id, "Post updated");
        Ok(post)
    }

    pub(super) async fn delete(&self, auth: &AuthInfo, id: i32) -> Result<(), AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_DELETE]).await?;
        let existing = self.ctx.db().posts.get(id).await?;
        auth.require_org(existing.organization_id, "post")?;

        self.ctx.db().posts.delete(id).await?;

        self.invalidate().await;
        info!(post_id = id, by = auth.user_id, "Post deleted");
        Ok(())
    }

    /// Delete every post the caller can see.
    pub(super) async fn delete_all(&self, auth: &AuthInfo) -> Result<u64, AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_DELETE]).await?;
        let deleted = self.ctx.db().posts.delete_all(auth.org_scope()).await?;

        self.invalidate().await;
        info!(deleted, by = auth.user_id, "All posts deleted");
        Ok(deleted)
    }
}
