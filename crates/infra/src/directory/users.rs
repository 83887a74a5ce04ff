//! User accounts: registration, password login, identity resolution and the
//! administrative mutations of role and active flag.
//!
//! # Invariants
//! - Emails are unique (case-insensitive).
//! - Role and active flag change only through `change_role` / `set_active`,
//!   which require `ManageUsers` of the acting identity.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use scribe_auth::{
    AuthzError, Claims, Identity, IdentityResolver, LookupError, PasswordError, Permission, Role,
    authorize, hash_password, verify_password,
};
use scribe_core::{DomainError, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("inactive user")]
    Inactive,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("user directory lock poisoned")]
    Poisoned,
}

/// Stored account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            role: self.role,
            active: self.active,
        }
    }
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub role: Role,
}

impl NewUser {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: None,
            role: Role::default(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }
}

#[derive(Debug, Default)]
struct Accounts {
    by_id: HashMap<UserId, UserRecord>,
    id_by_email: HashMap<String, UserId>,
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    inner: RwLock<Accounts>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, new_user: NewUser) -> Result<UserRecord, DirectoryError> {
        let email = normalize_email(&new_user.email);
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("email address is invalid").into());
        }

        let password_hash = hash_password(&new_user.password)?;

        let mut accounts = self.inner.write().map_err(|_| DirectoryError::Poisoned)?;
        if accounts.id_by_email.contains_key(&email) {
            return Err(DomainError::conflict(
                "The user with this email already exists in the system.",
            )
            .into());
        }

        let record = UserRecord {
            id: UserId::new(),
            email: email.clone(),
            full_name: new_user.full_name,
            password_hash,
            role: new_user.role,
            active: true,
        };
        accounts.id_by_email.insert(email, record.id);
        accounts.by_id.insert(record.id, record.clone());

        info!(user = %record.id, role = %record.role, "user registered");
        Ok(record)
    }

    /// Password login. Unknown email and wrong password are indistinguishable.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord, DirectoryError> {
        let record = self
            .get_by_email(email)?
            .ok_or(DirectoryError::InvalidCredentials)?;

        if !verify_password(password, &record.password_hash) {
            return Err(DirectoryError::InvalidCredentials);
        }
        if !record.active {
            return Err(DirectoryError::Inactive);
        }
        Ok(record)
    }

    /// All accounts, ordered by email.
    pub fn list(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let accounts = self.inner.read().map_err(|_| DirectoryError::Poisoned)?;
        let mut users: Vec<UserRecord> = accounts.by_id.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    pub fn get(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        let accounts = self.inner.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(accounts.by_id.get(&id).cloned())
    }

    pub fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let accounts = self.inner.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(accounts
            .id_by_email
            .get(&normalize_email(email))
            .and_then(|id| accounts.by_id.get(id))
            .cloned())
    }

    pub fn change_role(
        &self,
        actor: &Identity,
        user_id: UserId,
        role: Role,
    ) -> Result<UserRecord, DirectoryError> {
        self.mutate(actor, user_id, |record| record.role = role)
    }

    pub fn set_active(
        &self,
        actor: &Identity,
        user_id: UserId,
        active: bool,
    ) -> Result<UserRecord, DirectoryError> {
        self.mutate(actor, user_id, |record| record.active = active)
    }

    fn mutate<F>(&self, actor: &Identity, user_id: UserId, f: F) -> Result<UserRecord, DirectoryError>
    where
        F: FnOnce(&mut UserRecord),
    {
        authorize(actor, Permission::ManageUsers, None)?;

        let mut accounts = self.inner.write().map_err(|_| DirectoryError::Poisoned)?;
        let record = accounts
            .by_id
            .get_mut(&user_id)
            .ok_or(DirectoryError::Domain(DomainError::not_found()))?;
        f(record);

        info!(
            actor = %actor.id,
            user = %record.id,
            role = %record.role,
            active = record.active,
            "user account updated"
        );
        Ok(record.clone())
    }
}

#[async_trait]
impl IdentityResolver for InMemoryUserDirectory {
    async fn resolve(&self, claims: &Claims) -> Result<Option<Identity>, LookupError> {
        self.get_by_email(&claims.sub)
            .map(|record| record.map(|r| r.identity()))
            .map_err(|e| LookupError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn claims_for(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            iat: 0,
            exp: i64::MAX,
            token_type: "access_token".to_string(),
            extra: Map::new(),
        }
    }

    #[test]
    fn register_and_login() {
        let dir = InMemoryUserDirectory::new();
        let alice = dir
            .register(NewUser::new("Alice@Example.com", "pw-alice").with_role(Role::Author))
            .unwrap();

        assert_eq!(alice.email, "alice@example.com");
        assert_eq!(alice.role, Role::Author);
        assert!(alice.active);

        let logged_in = dir.authenticate("alice@example.com", "pw-alice").unwrap();
        assert_eq!(logged_in.id, alice.id);
        assert_eq!(
            dir.authenticate("alice@example.com", "wrong"),
            Err(DirectoryError::InvalidCredentials)
        );
        assert_eq!(
            dir.authenticate("nobody@example.com", "pw-alice"),
            Err(DirectoryError::InvalidCredentials)
        );
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let dir = InMemoryUserDirectory::new();
        dir.register(NewUser::new("a@x.com", "pw")).unwrap();
        let err = dir.register(NewUser::new("A@X.com", "pw2")).unwrap_err();
        assert!(matches!(err, DirectoryError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn new_users_default_to_reader() {
        let dir = InMemoryUserDirectory::new();
        let user = dir.register(NewUser::new("r@x.com", "pw")).unwrap();
        assert_eq!(user.role, Role::Reader);
    }

    #[test]
    fn only_admins_change_roles() {
        let dir = InMemoryUserDirectory::new();
        let admin = dir
            .register(NewUser::new("admin@x.com", "pw").with_role(Role::Admin))
            .unwrap();
        let author = dir
            .register(NewUser::new("author@x.com", "pw").with_role(Role::Author))
            .unwrap();

        let err = dir
            .change_role(&author.identity(), author.id, Role::Admin)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Forbidden(AuthzError::MissingPermission { .. })));

        let promoted = dir.change_role(&admin.identity(), author.id, Role::Admin).unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let emails: Vec<_> = dir.list().unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["admin@x.com", "author@x.com"]);
    }

    #[test]
    fn deactivated_users_cannot_log_in() {
        let dir = InMemoryUserDirectory::new();
        let admin = dir
            .register(NewUser::new("admin@x.com", "pw").with_role(Role::Admin))
            .unwrap();
        let reader = dir.register(NewUser::new("reader@x.com", "pw")).unwrap();

        dir.set_active(&admin.identity(), reader.id, false).unwrap();
        assert_eq!(
            dir.authenticate("reader@x.com", "pw"),
            Err(DirectoryError::Inactive)
        );
    }

    #[test]
    fn mutating_unknown_user_is_not_found() {
        let dir = InMemoryUserDirectory::new();
        let admin = dir
            .register(NewUser::new("admin@x.com", "pw").with_role(Role::Admin))
            .unwrap();
        let err = dir.set_active(&admin.identity(), UserId::new(), false).unwrap_err();
        assert_eq!(err, DirectoryError::Domain(DomainError::NotFound));
    }

    #[tokio::test]
    async fn resolves_identity_from_claims_subject() {
        let dir = InMemoryUserDirectory::new();
        let author = dir
            .register(NewUser::new("author@x.com", "pw").with_role(Role::Author))
            .unwrap();

        let identity = dir.resolve(&claims_for("author@x.com")).await.unwrap();
        assert_eq!(identity, Some(author.identity()));
        assert_eq!(dir.resolve(&claims_for("ghost@x.com")).await.unwrap(), None);
    }
}
