use scribe_auth::{Claims, Identity};

/// Authenticated caller for a request.
///
/// Inserted into request extensions by the bearer middleware; present on
/// every route behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    identity: Identity,
    claims: Claims,
    token: String,
}

impl AuthContext {
    pub fn new(identity: Identity, claims: Claims, token: impl Into<String>) -> Self {
        Self {
            identity,
            claims,
            token: token.into(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// The bearer token exactly as presented.
    pub fn token(&self) -> &str {
        &self.token
    }
}
