use serde::Serialize;
use thiserror::Error;

use scribe_core::UserId;

use crate::{Identity, Permission, Role, RolePermissionTable};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: account is inactive")]
    Inactive,

    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    MissingPermission { role: Role, permission: Permission },

    #[error("forbidden: '{permission}' requires ownership of the resource")]
    NotOwner { permission: Permission },
}

/// Decide whether `identity` may perform `permission`, against an explicit table.
///
/// - No IO
/// - No panics
/// - Inactive identities hold no permissions, admins included.
/// - Admins bypass ownership checks.
/// - For ownership-qualified permissions the owner is compared only when one
///   is supplied. A caller that passes `None` gets the role-level answer.
pub fn authorize_with(
    table: &RolePermissionTable,
    identity: &Identity,
    permission: Permission,
    resource_owner: Option<UserId>,
) -> Result<(), AuthzError> {
    if !identity.active {
        return Err(AuthzError::Inactive);
    }

    if identity.role == Role::Admin {
        return Ok(());
    }

    if !table.grants(identity.role, permission) {
        return Err(AuthzError::MissingPermission {
            role: identity.role,
            permission,
        });
    }

    if permission.is_ownership_qualified() {
        if let Some(owner) = resource_owner {
            if owner != identity.id {
                return Err(AuthzError::NotOwner { permission });
            }
        }
    }

    Ok(())
}

/// [`authorize_with`] against the process-wide table.
pub fn authorize(
    identity: &Identity,
    permission: Permission,
    resource_owner: Option<UserId>,
) -> Result<(), AuthzError> {
    authorize_with(
        RolePermissionTable::global(),
        identity,
        permission,
        resource_owner,
    )
}

/// Boolean form of [`authorize`].
pub fn check_permission(
    identity: &Identity,
    permission: Permission,
    resource_owner: Option<UserId>,
) -> bool {
    authorize(identity, permission, resource_owner).is_ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: Permission,
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    pub identity: IdentityState,
    pub resource_owner: Option<UserId>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityState {
    pub id: UserId,
    pub role: Role,
    pub active: bool,
    pub effective_permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Inactive,
    MissingPermission,
    NotOwner,
}

/// Explain why an authorization decision was made (or would be made).
///
/// Runs the same decision as [`authorize_with`] and wraps it with the
/// identity's effective permissions and, on denial, what would fix it.
pub fn explain_authorization(
    table: &RolePermissionTable,
    identity: &Identity,
    permission: Permission,
    resource_owner: Option<UserId>,
) -> AuthorizationExplanation {
    let decision = authorize_with(table, identity, permission, resource_owner);

    let effective_permissions = if identity.active {
        table.permissions_for(identity.role).iter().copied().collect()
    } else {
        Vec::new()
    };

    let state = IdentityState {
        id: identity.id,
        role: identity.role,
        active: identity.active,
        effective_permissions,
    };

    let (reason, denial_reason) = match decision {
        Ok(()) => {
            let reason = if identity.role == Role::Admin {
                "Identity has the admin role (all permissions, ownership not checked)".to_string()
            } else if permission.is_ownership_qualified() && resource_owner.is_some() {
                format!("Role '{}' grants '{}' and the identity owns the resource", identity.role, permission)
            } else {
                format!("Role '{}' grants '{}'", identity.role, permission)
            };
            (reason, None)
        }
        Err(AuthzError::Inactive) => (
            "Identity is inactive and holds no permissions".to_string(),
            Some(DenialReason {
                kind: DenialKind::Inactive,
                message: "Inactive accounts are denied every operation".to_string(),
                suggestions: vec!["Reactivate the account through user management".to_string()],
            }),
        ),
        Err(AuthzError::MissingPermission { role, permission }) => {
            let granting: Vec<&str> = Role::ALL
                .into_iter()
                .filter(|r| table.grants(*r, permission))
                .map(|r| r.as_str())
                .collect();

            (
                format!("Role '{role}' does not grant '{permission}'"),
                Some(DenialReason {
                    kind: DenialKind::MissingPermission,
                    message: format!("Missing required permission: '{permission}'"),
                    suggestions: vec![format!(
                        "Assign one of the roles that grant '{permission}': {granting:?}"
                    )],
                }),
            )
        }
        Err(AuthzError::NotOwner { permission }) => (
            format!(
                "Role '{}' grants '{}' only on resources the identity owns",
                identity.role, permission
            ),
            Some(DenialReason {
                kind: DenialKind::NotOwner,
                message: "The resource belongs to another user".to_string(),
                suggestions: vec![
                    "Ask the resource owner or an administrator to perform the change".to_string(),
                ],
            }),
        ),
    };

    AuthorizationExplanation {
        required_permission: permission,
        granted: denial_reason.is_none(),
        reason,
        identity: state,
        resource_owner,
        denial_reason,
    }
}
