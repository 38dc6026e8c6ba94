//! # Parent Resolver
//!
//! Pure decision rules for resolving the parent of a new comment. The
//! store applies them between lookups inside the insert transaction, so
//! a concurrently deleted parent cannot be accepted.
//!
//! The rules keep every reply tree at depth one: replying to a reply
//! attaches the new comment to that reply's root instead, and a parent
//! from a foreign thread is dropped entirely (never honored, no
//! fallback).

use crate::models::Comment;

/// The id the resolver should inspect next: the candidate itself when it
/// is a root comment, otherwise its root ancestor (flatten one level).
pub fn flatten_target(candidate: &Comment) -> i64 {
    candidate.parent.unwrap_or(candidate.id)
}

/// Final acceptance: the flattened candidate is only usable as a parent
/// if it lives in the thread the new comment is created in.
pub fn accept(root: &Comment, thread_id: i64) -> Option<i64> {
    (root.thread_id == thread_id).then_some(root.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comment, Mode};
    use chrono::Utc;

    fn comment(id: i64, thread_id: i64, parent: Option<i64>) -> Comment {
        Comment {
            id,
            thread_id,
            parent,
            created: Utc::now(),
            modified: None,
            mode: Mode::Approved,
            remote_addr: "deadbeef".into(),
            text: "...".into(),
            author: None,
            email: None,
            website: None,
            likes: 0,
            dislikes: 0,
            voters: Vec::new(),
            notification: false,
        }
    }

    #[test]
    fn root_candidate_is_kept() {
        let root = comment(1, 1, None);
        assert_eq!(flatten_target(&root), 1);
        assert_eq!(accept(&root, 1), Some(1));
    }

    #[test]
    fn reply_candidate_flattens_to_its_root() {
        let reply = comment(2, 1, Some(1));
        assert_eq!(flatten_target(&reply), 1);
    }

    #[test]
    fn foreign_thread_is_rejected() {
        let root = comment(1, 1, None);
        assert_eq!(accept(&root, 2), None);
    }
}
