//! Synchronizer state, snapshot and events.

use crate::error::SyncError;
use chirp_protocol::{ChangeSignal, Post, PostId};
use std::collections::HashSet;
use std::time::SystemTime;

/// State of the feed synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Not started, or the last refresh failed.
    #[default]
    Idle,
    /// A full refresh is in flight.
    Refreshing,
    /// The snapshot is current and the change signal is being polled.
    Polling,
    /// Stopped by the caller or by a lost session.
    Stopped,
}

impl SyncState {
    /// Returns true while the synchronizer is fetching or polling.
    pub fn is_running(&self) -> bool {
        matches!(self, SyncState::Refreshing | SyncState::Polling)
    }

    /// Returns true if `start` would begin a refresh.
    pub fn can_start(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Stopped)
    }
}

/// Local copy of the remote feed.
///
/// Posts are ordered newest first and IDs are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    posts: Vec<Post>,
    signal: Option<ChangeSignal>,
}

impl FeedSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts, newest first.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Change signal of the last applied refresh.
    pub fn signal(&self) -> Option<&ChangeSignal> {
        self.signal.as_ref()
    }

    /// Number of posts.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Returns true if there are no posts.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Returns true if a post with this ID is present.
    pub fn contains(&self, id: &PostId) -> bool {
        self.posts.iter().any(|p| &p.id == id)
    }

    /// Looks up a post by ID.
    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| &p.id == id)
    }

    /// Replaces the whole collection. Later duplicates of an ID are
    /// dropped; equal timestamps keep server order.
    pub(crate) fn replace(&mut self, posts: Vec<Post>, signal: ChangeSignal) {
        let mut seen = HashSet::with_capacity(posts.len());
        let mut posts: Vec<Post> = posts
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.posts = posts;
        self.signal = Some(signal);
    }

    /// Puts a post at the head of the feed. Returns false if the ID is
    /// already present.
    ///
    /// The timestamp is not consulted; the next refresh restores server
    /// order if the server clock lags the feed.
    pub(crate) fn prepend(&mut self, post: Post) -> bool {
        if self.contains(&post.id) {
            return false;
        }
        self.posts.insert(0, post);
        true
    }

    /// Removes a post. Returns false if it was not present.
    pub(crate) fn remove(&mut self, id: &PostId) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| &p.id != id);
        self.posts.len() != before
    }
}

/// Notifications published by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The snapshot was replaced by a refresh.
    Refreshed {
        /// Number of posts in the new snapshot.
        posts: usize,
    },
    /// A confirmed post was added to the snapshot.
    Published(Post),
    /// A confirmed delete removed a post from the snapshot.
    Deleted(PostId),
    /// An operation failed. The snapshot is unchanged.
    Error(SyncError),
    /// The session was lost and the synchronizer stopped.
    Unauthenticated,
}

/// Counters kept by the synchronizer.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Refreshes applied to the snapshot.
    pub refreshes: u64,
    /// Change-signal polls completed.
    pub polls: u64,
    /// Refresh results discarded as stale.
    pub discarded: u64,
    /// When the last refresh was applied.
    pub last_refresh: Option<SystemTime>,
    /// Most recent failure.
    pub last_error: Option<SyncError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_protocol::{Author, UserId};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn post(id: &str, secs: i64) -> Post {
        Post {
            id: PostId::new(id),
            content: String::new(),
            author: Author {
                id: UserId::new("u1"),
                username: "ana".into(),
            },
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn ids(snapshot: &FeedSnapshot) -> Vec<&str> {
        snapshot.posts().iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn state_predicates() {
        assert!(SyncState::Idle.can_start());
        assert!(SyncState::Stopped.can_start());
        assert!(!SyncState::Polling.can_start());
        assert!(SyncState::Refreshing.is_running());
        assert!(!SyncState::Stopped.is_running());
    }

    #[test]
    fn replace_sorts_newest_first() {
        let mut snapshot = FeedSnapshot::new();
        snapshot.replace(
            vec![post("a", 1), post("c", 3), post("b", 2)],
            ChangeSignal::new("v1"),
        );
        assert_eq!(ids(&snapshot), vec!["c", "b", "a"]);
        assert_eq!(snapshot.signal(), Some(&ChangeSignal::new("v1")));
    }

    #[test]
    fn replace_drops_duplicate_ids() {
        let mut snapshot = FeedSnapshot::new();
        snapshot.replace(vec![post("a", 1), post("a", 5)], ChangeSignal::new("v1"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.posts()[0].created_at.timestamp(), 1);
    }

    #[test]
    fn prepend_puts_post_first() {
        let mut snapshot = FeedSnapshot::new();
        snapshot.replace(vec![post("a", 1), post("c", 3)], ChangeSignal::new("v1"));

        assert!(snapshot.prepend(post("b", 2)));
        assert!(snapshot.prepend(post("d", 4)));
        assert!(!snapshot.prepend(post("a", 9)));

        assert_eq!(ids(&snapshot), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn remove_reports_presence() {
        let mut snapshot = FeedSnapshot::new();
        snapshot.replace(vec![post("a", 1)], ChangeSignal::new("v1"));
        assert!(snapshot.remove(&PostId::new("a")));
        assert!(!snapshot.remove(&PostId::new("a")));
        assert!(snapshot.is_empty());
    }

    proptest! {
        #[test]
        fn snapshot_stays_sorted_and_unique(
            initial in prop::collection::vec((0u8..20, 0i64..100), 0..20),
            prepends in prop::collection::vec((0u8..20, 0i64..100), 0..20),
            removals in prop::collection::vec(0u8..20, 0..10),
        ) {
            let mut snapshot = FeedSnapshot::new();
            snapshot.replace(
                initial.iter().map(|(id, t)| post(&format!("p{id}"), *t)).collect(),
                ChangeSignal::new("v"),
            );
            for id in &removals {
                snapshot.remove(&PostId::new(format!("p{id}")));
            }
            for pair in snapshot.posts().windows(2) {
                prop_assert!(pair[0].created_at >= pair[1].created_at);
            }

            for (id, t) in &prepends {
                let id = format!("p{id}");
                let fresh = !snapshot.contains(&PostId::new(id.as_str()));
                prop_assert_eq!(snapshot.prepend(post(&id, *t)), fresh);
                if fresh {
                    prop_assert_eq!(snapshot.posts()[0].id.as_str(), id.as_str());
                }
            }
            let posts = snapshot.posts();
            let unique: HashSet<_> = posts.iter().map(|p| p.id.clone()).collect();
            prop_assert_eq!(unique.len(), posts.len());
        }
    }
}
