//! Request-guarding pipeline: authenticate, resolve owner, authorize.
//!
//! Two explicit stages, composed by the transport layer:
//!
//! 1. [`Authenticator`] turns a raw bearer credential into an [`Identity`]
//!    (token verification + identity lookup). Failures are `Unauthorized`.
//! 2. [`PermissionGuard`] is configured with one [`Permission`] and an
//!    optional [`OwnerLookup`]; it resolves the addressed resource's owner and
//!    runs the permission engine. Failures are `Forbidden`.
//!
//! Store or lookup outages are reported as `Infrastructure`, never folded into
//! either of the above.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use scribe_core::{ResourceId, UserId};

use crate::authorize::{AuthzError, authorize, explain_authorization};
use crate::claims::Claims;
use crate::revocation::KeyStore;
use crate::token::{TokenError, TokenService};
use crate::{Identity, Permission, RolePermissionTable};

/// Failure of an external lookup (identity or resource owner).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("lookup failed: {0}")]
pub struct LookupError(pub String);

/// Resolves a verified claim set to the full identity from persistent storage.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` when the subject no longer exists.
    async fn resolve(&self, claims: &Claims) -> Result<Option<Identity>, LookupError>;
}

/// Resolves the current owner of a resource.
#[async_trait]
pub trait OwnerLookup: Send + Sync {
    /// `Ok(None)` when the resource does not exist.
    async fn owner_of(&self, resource: ResourceId) -> Result<Option<UserId>, LookupError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnauthorizedReason {
    #[error("missing bearer credential")]
    MissingCredential,

    #[error(transparent)]
    Token(TokenError),

    #[error("credential subject is unknown")]
    UnknownSubject,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("unauthorized: {0}")]
    Unauthorized(UnauthorizedReason),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl From<TokenError> for GuardError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Store(e) => GuardError::Infrastructure(e.to_string()),
            other => GuardError::Unauthorized(UnauthorizedReason::Token(other)),
        }
    }
}

impl From<LookupError> for GuardError {
    fn from(value: LookupError) -> Self {
        GuardError::Infrastructure(value.to_string())
    }
}

/// A successfully authenticated request principal.
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated {
    pub identity: Identity,
    pub claims: Claims,
}

pub struct Authenticator<S> {
    tokens: Arc<TokenService<S>>,
    identities: Arc<dyn IdentityResolver>,
}

impl<S> Clone for Authenticator<S> {
    fn clone(&self) -> Self {
        Self {
            tokens: self.tokens.clone(),
            identities: self.identities.clone(),
        }
    }
}

impl<S: KeyStore> Authenticator<S> {
    pub fn new(tokens: Arc<TokenService<S>>, identities: Arc<dyn IdentityResolver>) -> Self {
        Self { tokens, identities }
    }

    pub fn tokens(&self) -> &Arc<TokenService<S>> {
        &self.tokens
    }

    pub async fn authenticate(&self, raw: Option<&str>) -> Result<Authenticated, GuardError> {
        let raw = raw
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(GuardError::Unauthorized(UnauthorizedReason::MissingCredential))?;

        let claims = self.tokens.verify(raw).await.inspect_err(|e| {
            if let TokenError::Store(store) = e {
                warn!(error = %store, "revocation store unavailable during verification");
            }
        })?;

        let identity = self
            .identities
            .resolve(&claims)
            .await?
            .ok_or(GuardError::Unauthorized(UnauthorizedReason::UnknownSubject))?;

        Ok(Authenticated { identity, claims })
    }
}

/// One permission requirement, with optional ownership resolution.
#[derive(Clone)]
pub struct PermissionGuard {
    permission: Permission,
    owners: Option<Arc<dyn OwnerLookup>>,
}

impl PermissionGuard {
    /// A guard that never resolves owners (role-level check only).
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            owners: None,
        }
    }

    pub fn with_owner_lookup(mut self, owners: Arc<dyn OwnerLookup>) -> Self {
        self.owners = Some(owners);
        self
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Authorize `identity` for this guard's permission on `resource`.
    ///
    /// The owner is looked up only for ownership-qualified permissions and
    /// only when a resource is addressed. A resource that does not exist
    /// yields no owner and the decision falls back to the role check.
    pub async fn enforce(
        &self,
        identity: &Identity,
        resource: Option<ResourceId>,
    ) -> Result<(), GuardError> {
        let owner = match (resource, &self.owners) {
            (Some(resource), Some(owners)) if self.permission.is_ownership_qualified() => {
                owners.owner_of(resource).await?
            }
            _ => None,
        };

        authorize(identity, self.permission, owner).map_err(|err| {
            let explanation =
                explain_authorization(RolePermissionTable::global(), identity, self.permission, owner);
            info!(
                user = %identity.id,
                role = %identity.role,
                permission = %self.permission,
                reason = %explanation.reason,
                "permission denied"
            );
            GuardError::Forbidden(err)
        })
    }
}

/// Full pipeline for one request: authenticate, then enforce `guard`.
pub async fn require_permission<S: KeyStore>(
    authenticator: &Authenticator<S>,
    guard: &PermissionGuard,
    raw: Option<&str>,
    resource: Option<ResourceId>,
) -> Result<Authenticated, GuardError> {
    let authenticated = authenticator.authenticate(raw).await?;
    guard.enforce(&authenticated.identity, resource).await?;
    Ok(authenticated)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Duration;
    use serde_json::{Map, json};

    use scribe_core::PostId;

    use super::*;
    use crate::revocation::test_support::MemoryStore;
    use crate::{Role, TokenConfig};

    #[derive(Default)]
    struct Directory {
        by_email: Mutex<HashMap<String, Identity>>,
    }

    #[async_trait]
    impl IdentityResolver for Directory {
        async fn resolve(&self, claims: &Claims) -> Result<Option<Identity>, LookupError> {
            Ok(self.by_email.lock().unwrap().get(&claims.sub).copied())
        }
    }

    #[derive(Default)]
    struct Owners {
        posts: Mutex<HashMap<PostId, UserId>>,
        down: bool,
    }

    #[async_trait]
    impl OwnerLookup for Owners {
        async fn owner_of(&self, resource: ResourceId) -> Result<Option<UserId>, LookupError> {
            if self.down {
                return Err(LookupError("database unavailable".to_string()));
            }
            Ok(match resource {
                ResourceId::Post(id) => self.posts.lock().unwrap().get(&id).copied(),
                ResourceId::Comment(_) => None,
            })
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        authn: Authenticator<Arc<MemoryStore>>,
        directory: Arc<Directory>,
        owners: Arc<Owners>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let tokens = Arc::new(
            TokenService::new(&TokenConfig::new("guard-test-secret-0123456789abcdef"), store.clone())
                .unwrap(),
        );
        let directory = Arc::new(Directory::default());
        let owners = Arc::new(Owners::default());
        Fixture {
            store,
            authn: Authenticator::new(tokens, directory.clone()),
            directory,
            owners,
        }
    }

    impl Fixture {
        fn register(&self, email: &str, identity: Identity) -> String {
            self.directory
                .by_email
                .lock()
                .unwrap()
                .insert(email.to_string(), identity);
            let mut extra = Map::new();
            extra.insert("role".to_string(), json!(identity.role.as_str()));
            self.authn
                .tokens()
                .issue(email, Some(Duration::minutes(15)), extra)
                .unwrap()
        }

        fn post_owned_by(&self, owner: UserId) -> PostId {
            let post = PostId::new();
            self.owners.posts.lock().unwrap().insert(post, owner);
            post
        }

        fn guard(&self, permission: Permission) -> PermissionGuard {
            PermissionGuard::new(permission).with_owner_lookup(self.owners.clone())
        }
    }

    #[tokio::test]
    async fn author_deletes_own_post() {
        let fx = fixture();
        let author = Identity::new(UserId::new(), Role::Author);
        let token = fx.register("author@x.com", author);
        let post = fx.post_owned_by(author.id);

        let ok = require_permission(
            &fx.authn,
            &fx.guard(Permission::DeletePost),
            Some(&token),
            Some(post.into()),
        )
        .await
        .unwrap();
        assert_eq!(ok.identity, author);
    }

    #[tokio::test]
    async fn author_cannot_delete_someone_elses_post() {
        let fx = fixture();
        let author = Identity::new(UserId::new(), Role::Author);
        let token = fx.register("author@x.com", author);
        let post = fx.post_owned_by(UserId::new());

        let err = require_permission(
            &fx.authn,
            &fx.guard(Permission::DeletePost),
            Some(&token),
            Some(post.into()),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            GuardError::Forbidden(AuthzError::NotOwner {
                permission: Permission::DeletePost
            })
        );
    }

    #[tokio::test]
    async fn admin_bypasses_ownership() {
        let fx = fixture();
        let admin = Identity::new(UserId::new(), Role::Admin);
        let token = fx.register("admin@x.com", admin);
        let post = fx.post_owned_by(UserId::new());

        assert!(
            require_permission(
                &fx.authn,
                &fx.guard(Permission::EditPost),
                Some(&token),
                Some(post.into()),
            )
            .await
            .is_ok()
        );
    }

    #[tokio::test]
    async fn missing_resource_falls_back_to_role_check() {
        let fx = fixture();
        let author = Identity::new(UserId::new(), Role::Author);
        let token = fx.register("author@x.com", author);

        assert!(
            require_permission(
                &fx.authn,
                &fx.guard(Permission::EditPost),
                Some(&token),
                Some(PostId::new().into()),
            )
            .await
            .is_ok()
        );
    }

    #[tokio::test]
    async fn missing_credential_is_unauthorized() {
        let fx = fixture();
        for raw in [None, Some(""), Some("   ")] {
            assert_eq!(
                fx.authn.authenticate(raw).await,
                Err(GuardError::Unauthorized(UnauthorizedReason::MissingCredential))
            );
        }
    }

    #[tokio::test]
    async fn revoked_credential_is_unauthorized() {
        let fx = fixture();
        let reader = Identity::new(UserId::new(), Role::Reader);
        let token = fx.register("reader@x.com", reader);
        fx.authn.tokens().revoke(&token).await.unwrap();

        assert_eq!(
            fx.authn.authenticate(Some(&token)).await,
            Err(GuardError::Unauthorized(UnauthorizedReason::Token(TokenError::Revoked)))
        );
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthorized() {
        let fx = fixture();
        let token = fx
            .authn
            .tokens()
            .issue("ghost@x.com", None, Map::new())
            .unwrap();

        assert_eq!(
            fx.authn.authenticate(Some(&token)).await,
            Err(GuardError::Unauthorized(UnauthorizedReason::UnknownSubject))
        );
    }

    #[tokio::test]
    async fn inactive_user_is_forbidden_not_unauthorized() {
        let fx = fixture();
        let reader = Identity::new(UserId::new(), Role::Reader).deactivated();
        let token = fx.register("reader@x.com", reader);

        let err = require_permission(
            &fx.authn,
            &PermissionGuard::new(Permission::CreateComment),
            Some(&token),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err, GuardError::Forbidden(AuthzError::Inactive));
    }

    #[tokio::test]
    async fn store_outage_is_infrastructure() {
        let fx = fixture();
        let reader = Identity::new(UserId::new(), Role::Reader);
        let token = fx.register("reader@x.com", reader);
        fx.store.set_failing(true);

        assert!(matches!(
            fx.authn.authenticate(Some(&token)).await,
            Err(GuardError::Infrastructure(_))
        ));
    }

    #[tokio::test]
    async fn owner_lookup_outage_is_infrastructure() {
        let author = Identity::new(UserId::new(), Role::Author);
        let guard = PermissionGuard::new(Permission::EditPost).with_owner_lookup(Arc::new(Owners {
            down: true,
            ..Owners::default()
        }));

        assert!(matches!(
            guard.enforce(&author, Some(PostId::new().into())).await,
            Err(GuardError::Infrastructure(_))
        ));
    }

    #[tokio::test]
    async fn non_qualified_permission_skips_owner_lookup() {
        let author = Identity::new(UserId::new(), Role::Author);
        let guard = PermissionGuard::new(Permission::CreateComment).with_owner_lookup(Arc::new(Owners {
            down: true,
            ..Owners::default()
        }));

        assert!(guard.enforce(&author, Some(PostId::new().into())).await.is_ok());
    }
}
