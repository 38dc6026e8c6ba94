//! # AppError
//!
//! Centralized error handling for the Marginote ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all mn-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or out-of-bound input (e.g., blank text, oversized field)
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation targets a comment or thread that does not exist
    /// or is not visible to the caller
    #[error("{0} not found with id {1}")]
    NotFound(String, i64),

    /// Token verification failed, the ownership window elapsed, or a
    /// moderator-only action was attempted without a valid action token
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request's assumptions went stale under concurrent mutation
    #[error("conflict: {0}")]
    Conflict(String),

    /// The underlying store transaction could not commit. Fatal for the
    /// request; never retried here.
    #[error("store error: {0}")]
    Store(String),
}

/// A specialized Result type for Marginote logic.
pub type Result<T> = std::result::Result<T, AppError>;
