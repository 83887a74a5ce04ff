use serde::{Deserialize, Serialize};

use scribe_core::UserId;

use crate::Role;

/// The acting identity for one request.
///
/// Produced by an [`IdentityResolver`](crate::guard::IdentityResolver) from a
/// verified claim set. The permission engine only reads it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
    pub active: bool,
}

impl Identity {
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
