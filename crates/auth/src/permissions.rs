use std::collections::BTreeSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Role;

/// An operation a role may be allowed to perform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreatePost,
    EditPost,
    DeletePost,
    CreateComment,
    EditComment,
    DeleteComment,
    ManageUsers,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl Permission {
    /// The full permission universe.
    pub const ALL: [Permission; 7] = [
        Permission::CreatePost,
        Permission::EditPost,
        Permission::DeletePost,
        Permission::CreateComment,
        Permission::EditComment,
        Permission::DeleteComment,
        Permission::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreatePost => "create_post",
            Permission::EditPost => "edit_post",
            Permission::DeletePost => "delete_post",
            Permission::CreateComment => "create_comment",
            Permission::EditComment => "edit_comment",
            Permission::DeleteComment => "delete_comment",
            Permission::ManageUsers => "manage_users",
        }
    }

    /// Whether a non-admin grant additionally requires owning the resource.
    pub fn is_ownership_qualified(&self) -> bool {
        matches!(
            self,
            Permission::EditPost
                | Permission::DeletePost
                | Permission::EditComment
                | Permission::DeleteComment
        )
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleTableError {
    #[error("admin must hold every permission (missing '{0}')")]
    AdminIncomplete(Permission),

    #[error("role '{0}' has no permissions")]
    EmptyRole(Role),

    #[error("role '{lower}' grants '{permission}' which '{higher}' does not")]
    NotMonotone {
        lower: Role,
        higher: Role,
        permission: Permission,
    },
}

static STANDARD_TABLE: LazyLock<RolePermissionTable> = LazyLock::new(RolePermissionTable::standard);

/// Immutable role → permission-set mapping.
///
/// # Invariants
/// - `Admin` holds the full permission universe.
/// - `Reader ⊆ Author ⊆ Admin`.
/// - No role has an empty set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionTable {
    grants: [BTreeSet<Permission>; 3],
}

impl RolePermissionTable {
    /// The platform's built-in table.
    pub fn standard() -> Self {
        use Permission::*;

        let reader: BTreeSet<_> = [CreateComment, EditComment, DeleteComment].into();
        let mut author = reader.clone();
        author.extend([CreatePost, EditPost, DeletePost]);
        let admin: BTreeSet<_> = Permission::ALL.into();

        Self {
            grants: [reader, author, admin],
        }
    }

    /// Process-wide table, built on first use and shared by reference.
    pub fn global() -> &'static Self {
        &STANDARD_TABLE
    }

    /// Build a custom table, rejecting one that breaks the role hierarchy.
    pub fn new(
        reader: impl IntoIterator<Item = Permission>,
        author: impl IntoIterator<Item = Permission>,
        admin: impl IntoIterator<Item = Permission>,
    ) -> Result<Self, RoleTableError> {
        let table = Self {
            grants: [
                reader.into_iter().collect(),
                author.into_iter().collect(),
                admin.into_iter().collect(),
            ],
        };
        table.validate()?;
        Ok(table)
    }

    pub fn permissions_for(&self, role: Role) -> &BTreeSet<Permission> {
        &self.grants[role.index()]
    }

    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        self.permissions_for(role).contains(&permission)
    }

    fn validate(&self) -> Result<(), RoleTableError> {
        if let Some(missing) = Permission::ALL
            .into_iter()
            .find(|p| !self.grants(Role::Admin, *p))
        {
            return Err(RoleTableError::AdminIncomplete(missing));
        }

        for role in Role::ALL {
            if self.permissions_for(role).is_empty() {
                return Err(RoleTableError::EmptyRole(role));
            }
        }

        for pair in Role::ALL.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            if let Some(permission) = self
                .permissions_for(lower)
                .difference(self.permissions_for(higher))
                .next()
            {
                return Err(RoleTableError::NotMonotone {
                    lower,
                    higher,
                    permission: *permission,
                });
            }
        }

        Ok(())
    }
}

impl Default for RolePermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}
