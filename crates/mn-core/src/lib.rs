//! marginote/crates/mn-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Marginote:
//! models, the storage port, validation, parent resolution, the
//! moderation state machine, tokens, and identity hashing.

pub mod error;
pub mod identity;
pub mod models;
pub mod moderation;
pub mod resolver;
pub mod token;
pub mod traits;
pub mod validate;

// Re-exporting for easier access in other crates
pub use error::{AppError, Result};
pub use identity::IdentityHasher;
pub use models::*;
pub use moderation::ActivateOutcome;
pub use token::{Claim, Signer, TokenError};
pub use traits::CommentRepo;
