//! Post REST handlers.

use axum::Extension;
use axum::extract::State;
use signage_core::{AppError, AuthInfo};
use signage_db::Post;
use tracing::instrument;

use super::{
    CreatePostRequest, DeletedCount, PostListQuery, PostService, ReorderRequest,
    UpdatePostRequest, UpdatePrioritiesRequest, UpdatedCount,
};
use crate::core::{ApiResponse, JsonBody, PathParam, QueryParams};

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn list(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
    QueryParams(query): QueryParams<PostListQuery>,
) -> Result<ApiResponse<Vec<Post>>, AppError> {
    let (posts, pagination) = svc.list(&auth, &query).await?;
    Ok(ApiResponse::ok(posts).with_pagination(pagination))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn get(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<Post>, AppError> {
    Ok(ApiResponse::ok(svc.get(&auth, id).await?))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn create(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> Result<ApiResponse<Post>, AppError> {
    let post = svc.create(&auth, req).await?;
    Ok(ApiResponse::created(post).with_message("Post created successfully"))
}

#[instrument(skip(svc, auth, req), fields(user_id = auth.user_id))]
pub async fn update(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
    JsonBody(req): JsonBody<UpdatePostRequest>,
) -> Result<ApiResponse<Post>, AppError> {
    let post = svc.update(&auth, id, req).await?;
    Ok(ApiResponse::ok(post).with_message("Post updated successfully"))
}

#[instrument(skip(svc, auth), fields(user_id = auth.user_id))]
pub async fn delete(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<()>, AppError> {
    svc.delete(&auth, id).await?;
    Ok(ApiResponse::message("Post deleted successfully"))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn delete_all(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<ApiResponse<DeletedCount>, AppError> {
    let deleted_count = svc.delete_all(&auth).await?;
    Ok(ApiResponse::ok(DeletedCount { deleted_count })
        .with_message(format!("{deleted_count} post(s) deleted")))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn reorder(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<ReorderRequest>,
) -> Result<ApiResponse<UpdatedCount>, AppError> {
    let updated = svc.reorder(&auth, &req.ordered_ids).await?;
    Ok(ApiResponse::ok(UpdatedCount { updated }).with_message("Posts reordered"))
}

#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn update_priorities(
    State(svc): State<PostService>,
    Extension(auth): Extension<AuthInfo>,
    JsonBody(req): JsonBody<UpdatePrioritiesRequest>,
) -> Result<ApiResponse<UpdatedCount>, AppError> {
    let updated = svc.update_priorities(&auth, &req.priorities).await?;
    Ok(ApiResponse::ok(UpdatedCount { updated }).with_message("Priorities updated"))
}
