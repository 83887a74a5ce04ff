//! `scribe-auth`: access control for the blog platform's write paths.
//!
//! Three cooperating pieces:
//! - the permission engine (`permissions`, `authorize`): pure role/ownership decisions;
//! - the token service (`token`): signed access tokens with claims;
//! - the revocation ledger (`revocation`): a TTL-bounded denylist in a shared keyed store.
//!
//! `guard` composes them into the per-request pipeline. This crate is
//! decoupled from HTTP and storage; both are reached through traits.

pub mod authorize;
pub mod claims;
pub mod config;
pub mod guard;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod revocation;
pub mod roles;
pub mod token;

pub use authorize::{AuthzError, authorize, authorize_with, check_permission, explain_authorization};
pub use claims::{ACCESS_TOKEN_TYPE, Claims, TokenValidationError, validate_claims};
pub use config::{TokenConfig, TokenConfigError};
pub use guard::{
    Authenticated, Authenticator, GuardError, IdentityResolver, LookupError, OwnerLookup,
    PermissionGuard, UnauthorizedReason, require_permission,
};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::{Permission, RolePermissionTable, RoleTableError};
pub use principal::Identity;
pub use revocation::{KeyStore, RevocationLedger, RevokeError, RevokeOutcome, StoreError};
pub use roles::Role;
pub use token::{TokenCodec, TokenError, TokenService};
