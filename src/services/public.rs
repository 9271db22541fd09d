//! Unauthenticated read API used by display pages.

use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use signage_core::AppError;
use signage_db::{Category, Post};
use tracing::{debug, instrument};

use super::displays::to_json;
use crate::core::{ApiResponse, PathParam, QueryParams, ServiceContext, cache_keys};

#[derive(Debug, Default, Deserialize)]
pub struct ActivePostsQuery {
    /// Organization slug; ignored when no such organization exists.
    pub organization: Option<String>,
    pub category: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoriesQuery {
    pub organization: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivePosts {
    pub count: usize,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub sso: bool,
    pub azure_ad: bool,
    pub ldap: bool,
    pub device_pairing: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub features: Features,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct PublicService {
    ctx: Arc<ServiceContext>,
}

impl PublicService {
    #[must_use]
    pub const fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Organization id for a slug, `None` when absent or unknown.
    async fn org_by_slug(&self, slug: Option<&str>) -> Result<Option<i32>, AppError> {
        match slug {
            Some(slug) => Ok(self
                .ctx
                .db()
                .organizations
                .find_by_slug(slug)
                .await?
                .map(|org| org.id)),
            None => Ok(None),
        }
    }

    pub async fn active_posts(
        &self,
        organization: Option<&str>,
        category: Option<i32>,
    ) -> Result<Value, AppError> {
        let key = cache_keys::active_posts(organization, category);
        self.ctx
            .cache()
            .wrap(&key, cache_keys::POSTS_TTL, || async {
                let org = self.org_by_slug(organization).await?;
                let posts = self.ctx.db().posts.list_active(org, category).await?;
                debug!(count = posts.len(), "Active posts loaded");
                to_json(&ActivePosts {
                    count: posts.len(),
                    posts,
                })
            })
            .await
    }

    /// An active post; each read counts as a view.
    pub async fn post(&self, id: i32) -> Result<Post, AppError> {
        let db = self.ctx.db();
        let mut post = db.posts.get(id).await?;
        if !post.is_active {
            return Err(AppError::not_found("Post", id));
        }
        db.posts.increment_view_count(id).await?;
        post.view_count += 1;
        Ok(post)
    }

    pub async fn categories(&self, organization: Option<&str>) -> Result<Vec<Category>, AppError> {
        let org = self.org_by_slug(organization).await?;
        self.ctx.db().categories.list_active(org).await
    }

    #[must_use]
    pub fn info(&self) -> ServiceInfo {
        let sso = self.ctx.sso();
        ServiceInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            features: Features {
                sso: sso.enabled,
                azure_ad: sso.azure_enabled(),
                ldap: sso.ldap_enabled(),
                device_pairing: true,
            },
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[instrument(skip(svc))]
pub async fn active_posts(
    State(svc): State<PublicService>,
    QueryParams(query): QueryParams<ActivePostsQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let organization = non_blank(query.organization.as_deref());
    Ok(ApiResponse::ok(
        svc.active_posts(organization, query.category).await?,
    ))
}

#[instrument(skip(svc))]
pub async fn post(
    State(svc): State<PublicService>,
    PathParam(id): PathParam<i32>,
) -> Result<ApiResponse<Post>, AppError> {
    Ok(ApiResponse::ok(svc.post(id).await?))
}

#[instrument(skip(svc))]
pub async fn categories(
    State(svc): State<PublicService>,
    QueryParams(query): QueryParams<CategoriesQuery>,
) -> Result<ApiResponse<Vec<Category>>, AppError> {
    let organization = non_blank(query.organization.as_deref());
    Ok(ApiResponse::ok(svc.categories(organization).await?))
}

pub async fn info(State(svc): State<PublicService>) -> ApiResponse<ServiceInfo> {
    ApiResponse::ok(svc.info())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_ignored() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" acme ")), Some("acme"));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn active_posts_payload_shape() {
        let json = serde_json::to_value(ActivePosts {
            count: 0,
            posts: Vec::new(),
        })
        .unwrap();
        assert_eq!(json["count"], 0);
        assert!(json["posts"].as_array().unwrap().is_empty());
    }
}
