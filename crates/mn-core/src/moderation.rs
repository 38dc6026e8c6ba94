//! # Moderation State Machine
//!
//! Pure transition rules for the comment lifecycle:
//! creation enters at `Pending` or `Approved`, moderator activation
//! moves `Pending -> Approved`, and deletion decides between a
//! tombstone and physical removal. Tombstones are sinks; only the reap
//! cascade removes them.

use crate::error::{AppError, Result};
use crate::models::Mode;

/// Entry state for a newly created comment.
pub fn entry_mode(moderation_enabled: bool) -> Mode {
    if moderation_enabled {
        Mode::Pending
    } else {
        Mode::Approved
    }
}

/// Outcome of a moderator "activate" action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateOutcome {
    Activated,
    /// The comment was approved before this call; reported instead of
    /// erroring so activation links can be clicked twice.
    AlreadyActivated,
}

/// Decides the activate transition for a comment in `current` state.
pub fn activate(current: Mode) -> Result<ActivateOutcome> {
    match current {
        Mode::Pending => Ok(ActivateOutcome::Activated),
        Mode::Approved => Ok(ActivateOutcome::AlreadyActivated),
        Mode::Tombstone => Err(AppError::Forbidden(
            "comment has been deleted".into(),
        )),
    }
}

/// Whether an edit may be applied to a comment in `current` state.
pub fn editable(current: Mode) -> Result<()> {
    match current {
        Mode::Approved | Mode::Pending => Ok(()),
        Mode::Tombstone => Err(AppError::Forbidden(
            "comment has been deleted".into(),
        )),
    }
}

/// How a delete request disposes of a comment with `children` live
/// references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Keep the row, clear its content: children still anchor to it.
    Tombstone,
    /// No references remain, the row can go.
    Physical,
}

pub fn removal(children: i64) -> Removal {
    if children > 0 {
        Removal::Tombstone
    } else {
        Removal::Physical
    }
}
