use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::Role;

/// Token-kind discriminator carried by every access token.
pub const ACCESS_TOKEN_TYPE: &str = "access_token";

/// Claim names owned by the token service; extra claims may not override them.
pub const RESERVED_CLAIMS: [&str; 4] = ["sub", "iat", "exp", "type"];

/// Decoded payload of an access token.
///
/// Wire shape: `{sub, iat, exp, type, ...extra}` with timestamps in Unix
/// seconds. Extra claims (e.g. `role`) are flattened into the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the account's email address).
    pub sub: String,

    /// Issued-at, Unix seconds.
    pub iat: i64,

    /// Expiry, Unix seconds. The token is valid while `now < exp`.
    pub exp: i64,

    #[serde(rename = "type")]
    pub token_type: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// The embedded `role` claim, if present and recognised.
    pub fn role(&self) -> Option<Role> {
        self.get("role")
            .and_then(Value::as_str)
            .and_then(Role::parse)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Time left before expiry; zero or negative once expired.
    pub fn remaining_validity(&self, now: DateTime<Utc>) -> Duration {
        Duration::seconds(self.exp - now.timestamp())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature verification happens before this, in the codec.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if now.timestamp() >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
