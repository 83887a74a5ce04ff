//! `scribe-core`: shared identifiers and the domain error model.
//!
//! Pure types only; nothing in here knows about tokens, stores or HTTP.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{CommentId, PostId, ResourceId, UserId};
