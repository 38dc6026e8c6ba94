//! # Core Traits (Ports)
//!
//! Any storage plugin must implement these traits to be used by the
//! binary. Every mutating method executes as one atomic unit against
//! the store, so parent resolution and the reap cascade can never
//! observe a half-applied peer operation.

use async_trait::async_trait;
use chrono::Duration;

use crate::error::Result;
use crate::models::{
    Comment, CommentEdit, DeleteOutcome, NewComment, Thread, VoteOutcome,
};
use crate::moderation::ActivateOutcome;

/// Data persistence contract for threads and comments.
#[async_trait]
pub trait CommentRepo: Send + Sync {
    // Lifecycle operations

    /// Creates a comment under `uri`, lazily creating the thread and
    /// resolving the requested parent inside the same transaction.
    async fn create(&self, uri: &str, title: Option<&str>, new: NewComment) -> Result<Comment>;

    async fn get(&self, id: i64) -> Result<Option<Comment>>;

    /// Applies an edit; `modified` is set, tombstones are rejected.
    async fn update(&self, id: i64, edit: CommentEdit) -> Result<Comment>;

    /// Approves a pending comment. Idempotent: re-activating an approved
    /// comment reports `AlreadyActivated` instead of failing.
    async fn activate(&self, id: i64) -> Result<ActivateOutcome>;

    /// Deletes a comment: tombstone when children remain, physical
    /// removal otherwise, followed by the reap cascade and, if the
    /// thread is left empty, thread teardown.
    async fn delete(&self, id: i64) -> Result<DeleteOutcome>;

    /// Applies the delete policy to every `PENDING` comment older than
    /// `min_age`. Approved comments and tombstones are never touched.
    /// Returns the number of purged comments.
    async fn purge(&self, min_age: Duration) -> Result<u64>;

    /// Records a like/dislike, deduplicated by voter fingerprint.
    async fn vote(&self, id: i64, like: bool, voter: &str) -> Result<VoteOutcome>;

    /// Clears the notification flag for `email` across the thread that
    /// owns comment `id`.
    async fn unsubscribe(&self, id: i64, email: &str) -> Result<()>;

    // Aggregation (read-only)

    async fn thread_by_uri(&self, uri: &str) -> Result<Option<Thread>>;

    /// Approved-comment count per URI; zero for unknown URIs.
    async fn count_by_uris(&self, uris: &[String]) -> Result<Vec<i64>>;

    /// Visible comments of a thread: root level when `parent` is `None`,
    /// direct children of `parent` otherwise. Tombstones are included
    /// since they anchor their children's position. Ordered by creation
    /// time with the id as a stable tie-break.
    async fn fetch(&self, uri: &str, parent: Option<i64>, limit: Option<i64>) -> Result<Vec<Comment>>;

    /// Globally newest approved comments across all threads. `limit`
    /// must be a positive integer; there is no default.
    async fn latest(&self, limit: i64) -> Result<Vec<(Thread, Comment)>>;
}
