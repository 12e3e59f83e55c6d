//! In-memory pending-post tracker.
//!
//! `PendingPostTracker` maps each channel to the most recently posted notice
//! still awaiting its compliance check. At most one entry exists per channel;
//! `record` is last-write-wins, so a newer notice simply supersedes an older
//! one. A workflow that finishes its check clears the entry it recorded —
//! but only if it has not been superseded in the meantime.
//!
//! The tracker itself is not `Sync` — callers wrap it in
//! `Arc<RwLock<PendingPostTracker>>` so the tick driver can write while
//! compliance workflows read concurrently.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::platform::{ChannelId, MessageId};

/// The notice most recently posted to a channel, awaiting its check.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPost {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub posted_at: DateTime<Utc>,
}

/// Channel → pending notice map. No history is retained.
#[derive(Debug, Default)]
pub struct PendingPostTracker {
    posts: HashMap<ChannelId, PendingPost>,
}

impl PendingPostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the pending post for a channel, replacing any previous entry
    /// (last-write-wins).
    pub fn record(&mut self, channel_id: ChannelId, message_id: MessageId, posted_at: DateTime<Utc>) {
        self.posts.insert(
            channel_id,
            PendingPost {
                channel_id,
                message_id,
                posted_at,
            },
        );
    }

    /// Non-blocking read of a channel's pending post.
    pub fn get(&self, channel_id: ChannelId) -> Option<PendingPost> {
        self.posts.get(&channel_id).cloned()
    }

    /// Drop the entry for a completed check, unless a newer post has
    /// superseded it. Stale entries are harmless; this merely bounds memory.
    pub fn clear_completed(&mut self, channel_id: ChannelId, message_id: MessageId) {
        if self
            .posts
            .get(&channel_id)
            .is_some_and(|post| post.message_id == message_id)
        {
            self.posts.remove(&channel_id);
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_is_empty() {
        let tracker = PendingPostTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.get(1), None);
    }

    #[test]
    fn record_then_get_returns_the_post() {
        let mut tracker = PendingPostTracker::new();
        let posted_at = Utc::now();
        tracker.record(1, 100, posted_at);

        let post = tracker.get(1).unwrap();
        assert_eq!(post.channel_id, 1);
        assert_eq!(post.message_id, 100);
        assert_eq!(post.posted_at, posted_at);
    }

    #[test]
    fn record_overwrites_existing_entry() {
        let mut tracker = PendingPostTracker::new();
        tracker.record(1, 100, Utc::now());
        tracker.record(1, 200, Utc::now());

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(1).unwrap().message_id, 200);
    }

    #[test]
    fn channels_are_tracked_independently() {
        let mut tracker = PendingPostTracker::new();
        tracker.record(1, 100, Utc::now());
        tracker.record(2, 200, Utc::now());

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.get(1).unwrap().message_id, 100);
        assert_eq!(tracker.get(2).unwrap().message_id, 200);
    }

    #[test]
    fn clear_completed_removes_matching_entry() {
        let mut tracker = PendingPostTracker::new();
        tracker.record(1, 100, Utc::now());
        tracker.clear_completed(1, 100);
        assert!(tracker.is_empty());
    }

    #[test]
    fn clear_completed_leaves_superseded_entry_alone() {
        let mut tracker = PendingPostTracker::new();
        tracker.record(1, 100, Utc::now());
        tracker.record(1, 200, Utc::now());

        // The workflow for message 100 completes after being superseded.
        tracker.clear_completed(1, 100);
        assert_eq!(tracker.get(1).unwrap().message_id, 200);
    }

    #[test]
    fn clear_completed_on_unknown_channel_is_a_no_op() {
        let mut tracker = PendingPostTracker::new();
        tracker.clear_completed(42, 100);
        assert!(tracker.is_empty());
    }
}
