//! Bulk priority changes.

use signage_core::validation::{PRIORITY_RANGE, validate_priority};
use signage_core::{AppError, AuthInfo, permissions as perm};
use tracing::info;

use super::{PostService, PriorityChange};
use crate::services::permissions::require_permission;

/// Priorities for a drag-and-drop order: the first id gets the highest value.
///
/// Fails when the order has more entries than there are priority values.
pub fn priorities_for_order(ordered_ids: &[i32]) -> Result<Vec<(i32, i32)>, AppError> {
    let total = i32::try_from(ordered_ids.len())
        .ok()
        .filter(|total| total <= PRIORITY_RANGE.end())
        .ok_or_else(|| {
            AppError::invalid(format!(
                "orderedIds may hold at most {} posts",
                PRIORITY_RANGE.end()
            ))
        })?;
    Ok(ordered_ids
        .iter()
        .zip(0..)
        .map(|(&id, index)| (id, total - index))
        .collect())
}

impl PostService {
    pub(super) async fn reorder(
        &self,
        auth: &AuthInfo,
        ordered_ids: &[i32],
    ) -> Result<u64, AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_UPDATE]).await?;
        if ordered_ids.is_empty() {
            return Err(AppError::invalid("orderedIds must not be empty"));
        }

        let priorities = priorities_for_order(ordered_ids)?;
        let updated = self
            .ctx
            .db()
            .posts
            .set_priorities(auth.org_scope(), &priorities)
            .await?;

        self.invalidate().await;
        info!(updated, by = auth.user_id, "Posts reordered");
        Ok(updated)
    }

    pub(super) async fn update_priorities(
        &self,
        auth: &AuthInfo,
        changes: &[PriorityChange],
    ) -> Result<u64, AppError> {
        require_permission(&self.ctx, auth, &[perm::POSTS_UPDATE]).await?;
        if changes.is_empty() {
            return Err(AppError::invalid("priorities must not be empty"));
        }
        for change in changes {
            validate_priority(change.priority)?;
        }

        let pairs: Vec<(i32, i32)> = changes.iter().map(|c| (c.id, c.priority)).collect();
        let updated = self.ctx.db().posts.set_priorities(auth.org_scope(), &pairs).await?;

        self.invalidate().await;
        info!(updated, by = auth.user_id, "Post priorities updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_in_order_gets_highest_priority() {
        assert_eq!(
            priorities_for_order(&[9, 4, 7]).unwrap(),
            vec![(9, 3), (4, 2), (7, 1)]
        );
    }

    #[test]
    fn empty_order_yields_nothing() {
        assert!(priorities_for_order(&[]).unwrap().is_empty());
    }

    #[test]
    fn hundred_posts_stay_within_priority_bounds() {
        let ids: Vec<i32> = (1..=100).collect();
        let priorities = priorities_for_order(&ids).unwrap();
        assert_eq!(priorities.first(), Some(&(1, 100)));
        assert_eq!(priorities.last(), Some(&(100, 1)));
    }

    #[test]
    fn orders_longer_than_the_priority_range_are_rejected() {
        let ids: Vec<i32> = (1..=150).collect();
        let err = priorities_for_order(&ids).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
