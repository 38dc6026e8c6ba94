//! # Domain Models
//!
//! These structs represent the core entities of Marginote.
//! Comment ids are store-assigned monotonic integers, global across all
//! threads, and never reused after deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The comment collection anchored to one page URI.
///
/// A thread exists only while at least one comment row (including
/// tombstones) references it; it is created lazily on the first accepted
/// comment for its URI and torn down when the last row is reaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    /// The client-supplied page path (e.g., "/blog/first-post/")
    pub uri: String,
    pub title: Option<String>,
}

/// Visibility state of a comment, stored as an integer.
///
/// The values are bit-disjoint so listing queries can mask them:
/// the public mask is `APPROVED | TOMBSTONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Approved,
    Pending,
    Tombstone,
}

impl Mode {
    pub fn as_i64(self) -> i64 {
        match self {
            Mode::Approved => 1,
            Mode::Pending => 2,
            Mode::Tombstone => 4,
        }
    }

    pub fn from_i64(raw: i64) -> Option<Mode> {
        match raw {
            1 => Some(Mode::Approved),
            2 => Some(Mode::Pending),
            4 => Some(Mode::Tombstone),
            _ => None,
        }
    }
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub thread_id: i64,
    /// Reference to a root comment in the same thread, if this is a reply.
    /// The chain is never deeper than one level (see the parent resolver).
    pub parent: Option<i64>,
    pub created: DateTime<Utc>,
    pub modified: Option<DateTime<Utc>>,
    pub mode: Mode,
    /// Opaque identity fingerprint of the creating client; never a raw
    /// address.
    pub remote_addr: String,
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    /// Fingerprints of clients that already voted on this comment.
    pub voters: Vec<String>,
    /// Email-notification opt-in for replies within the thread.
    pub notification: bool,
}

/// Validated input for a creation request.
#[derive(Debug, Clone)]
pub struct NewComment {
    /// The parent id as requested by the client; the store resolves it
    /// (flattening and cross-thread rejection) inside the insert
    /// transaction.
    pub parent: Option<i64>,
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub remote_addr: String,
    pub mode: Mode,
    pub notification: bool,
}

/// Fields a client or moderator may change on an existing comment.
/// `created` and `id` are immutable; `None` leaves a field untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentEdit {
    pub text: String,
    pub author: Option<String>,
    pub website: Option<String>,
}

/// Result of a delete request.
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// Children remain: the row is kept as a tombstone with its content
    /// cleared ("deleted, reference preserved").
    Tombstoned(Comment),
    /// No children: the row was physically removed ("full delete").
    Removed,
}

/// Result of a like/dislike request. `applied` is false when the voter
/// already voted or tried to vote on their own comment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoteOutcome {
    pub applied: bool,
    pub likes: i64,
    pub dislikes: i64,
}
