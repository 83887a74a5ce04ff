//! In-memory collaborators for the access layer: user accounts (identity
//! resolution, login) and resource ownership.

pub mod owners;
pub mod users;

pub use owners::InMemoryOwnerRegistry;
pub use users::{DirectoryError, InMemoryUserDirectory, NewUser, UserRecord};
