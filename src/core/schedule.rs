//! Content selection: which posts a display shows right now, and in what order.
//!
//! A post is visible on display `D` at `now` when it is active, targets `D`
//! (mode `all` or an explicit assignment) and `now` falls inside its
//! optional `[start, end]` window. Visible posts play by priority, highest
//! first, then newest first.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use signage_db::{DisplayMode, Post};

/// The scheduling view of a post.
pub trait Schedulable {
    fn id(&self) -> i32;
    fn is_active(&self) -> bool;
    fn display_mode(&self) -> DisplayMode;
    fn targets(&self, display_id: i32) -> bool;
    fn start_date(&self) -> Option<DateTime<Utc>>;
    fn end_date(&self) -> Option<DateTime<Utc>>;
    fn priority(&self) -> i32;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Schedulable for Post {
    fn id(&self) -> i32 {
        self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    fn targets(&self, display_id: i32) -> bool {
        self.display_ids.contains(&display_id)
    }

    fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Whether `now` lies inside the post's schedule window (bounds inclusive).
pub fn in_window<P: Schedulable>(post: &P, now: DateTime<Utc>) -> bool {
    post.start_date().is_none_or(|start| start <= now)
        && post.end_date().is_none_or(|end| end >= now)
}

/// Full visibility rule. `display_id = None` skips the targeting check.
pub fn is_visible<P: Schedulable>(post: &P, display_id: Option<i32>, now: DateTime<Utc>) -> bool {
    let targeted = match display_id {
        None => true,
        Some(id) => post.display_mode() == DisplayMode::All || post.targets(id),
    };
    post.is_active() && targeted && in_window(post, now)
}

/// Playback order: priority DESC, then creation time DESC.
pub fn playback_order<P: Schedulable>(a: &P, b: &P) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| b.created_at().cmp(&a.created_at()))
}

/// Filter and order candidates into the playlist for a display.
pub fn select<P: Schedulable>(
    candidates: Vec<P>,
    display_id: Option<i32>,
    now: DateTime<Utc>,
) -> Vec<P> {
    let mut playlist: Vec<P> = candidates
        .into_iter()
        .filter(|post| is_visible(post, display_id, now))
        .collect();
    playlist.sort_by(playback_order);
    playlist
}

/// Post to show after `current`, wrapping around at the end.
///
/// Starts from the head when `current` is `None` or no longer scheduled.
pub fn next_after<P: Schedulable>(playlist: &[P], current: Option<i32>) -> Option<&P> {
    let position = current.and_then(|id| playlist.iter().position(|p| p.id() == id));
    match position {
        Some(index) => playlist.get((index + 1) % playlist.len()),
        None => playlist.first(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[derive(Debug, Clone)]
    struct Item {
        id: i32,
        active: bool,
        mode: DisplayMode,
        displays: Vec<i32>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        priority: i32,
        created: DateTime<Utc>,
    }

    impl Schedulable for Item {
        fn id(&self) -> i32 {
            self.id
        }
        fn is_active(&self) -> bool {
            self.active
        }
        fn display_mode(&self) -> DisplayMode {
            self.mode
        }
        fn targets(&self, display_id: i32) -> bool {
            self.displays.contains(&display_id)
        }
        fn start_date(&self) -> Option<DateTime<Utc>> {
            self.start
        }
        fn end_date(&self) -> Option<DateTime<Utc>> {
            self.end
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.created
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn item(id: i32) -> Item {
        Item {
            id,
            active: true,
            mode: DisplayMode::All,
            displays: Vec::new(),
            start: None,
            end: None,
            priority: 0,
            created: now() - Duration::days(1),
        }
    }

    fn ids(items: &[Item]) -> Vec<i32> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn inactive_posts_are_hidden() {
        let post = Item { active: false, ..item(1) };
        assert!(!is_visible(&post, Some(5), now()));
    }

    #[test]
    fn specific_mode_requires_assignment() {
        let assigned = Item {
            mode: DisplayMode::Specific,
            displays: vec![5],
            ..item(1)
        };
        assert!(is_visible(&assigned, Some(5), now()));
        assert!(!is_visible(&assigned, Some(6), now()));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let exact = Item {
            start: Some(now()),
            end: Some(now()),
            ..item(1)
        };
        assert!(is_visible(&exact, Some(1), now()));

        let future = Item {
            start: Some(now() + Duration::seconds(1)),
            ..item(2)
        };
        assert!(!is_visible(&future, Some(1), now()));

        let expired = Item {
            end: Some(now() - Duration::seconds(1)),
            ..item(3)
        };
        assert!(!is_visible(&expired, Some(1), now()));
    }

    #[test]
    fn playlist_orders_by_priority_then_newest() {
        let older_high = Item {
            priority: 50,
            created: now() - Duration::days(3),
            ..item(1)
        };
        let newer_high = Item {
            priority: 50,
            created: now() - Duration::days(1),
            ..item(2)
        };
        let low = Item { priority: 10, ..item(3) };
        let hidden = Item { active: false, priority: 99, ..item(4) };

        let playlist = select(vec![low, older_high, hidden, newer_high], Some(1), now());
        assert_eq!(ids(&playlist), vec![2, 1, 3]);
    }

    #[test]
    fn no_display_skips_targeting() {
        let post = Item {
            mode: DisplayMode::Specific,
            ..item(1)
        };
        assert_eq!(ids(&select(vec![post], None, now())), vec![1]);
    }

    #[test]
    fn next_after_wraps_around() {
        let playlist = vec![item(1), item(2), item(3)];
        assert_eq!(next_after(&playlist, None).map(|p| p.id), Some(1));
        assert_eq!(next_after(&playlist, Some(1)).map(|p| p.id), Some(2));
        assert_eq!(next_after(&playlist, Some(3)).map(|p| p.id), Some(1));
        assert_eq!(next_after(&playlist, Some(42)).map(|p| p.id), Some(1));
        assert!(next_after::<Item>(&[], Some(1)).is_none());
    }
}
