//! Token configuration.

pub use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claims::ACCESS_TOKEN_TYPE;

/// Default prefix of revocation marker keys in the shared store.
pub const DEFAULT_REVOCATION_KEY_PREFIX: &str = "blacklist_token:";

/// Upper bound on the configured access-token lifetime (one year).
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Signing and lifetime settings, fixed at process start.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Symmetric signing key.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Signing algorithm (HMAC family only).
    pub algorithm: Algorithm,
    /// Default access-token lifetime in minutes.
    pub access_token_ttl_minutes: i64,
    /// Token-kind discriminator written to the `type` claim.
    pub token_type: String,
    /// Key prefix for revocation markers.
    pub revocation_key_prefix: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("token signing secret is not configured")]
    EmptySecret,

    #[error("unsupported signing algorithm {0:?}: only HS256, HS384 and HS512 are accepted")]
    UnsupportedAlgorithm(Algorithm),

    #[error("access token lifetime must be positive (got {0} minutes)")]
    NonPositiveTtl(i64),

    #[error("access token lifetime of {0} minutes exceeds the maximum of {MAX_ACCESS_TOKEN_TTL_MINUTES}")]
    TtlTooLarge(i64),
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: Algorithm::HS256,
            access_token_ttl_minutes: 30,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            revocation_key_prefix: DEFAULT_REVOCATION_KEY_PREFIX.to_string(),
        }
    }
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    pub fn with_revocation_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.revocation_key_prefix = prefix.into();
        self
    }

    pub fn default_ttl(&self) -> Result<chrono::Duration, TokenConfigError> {
        chrono::Duration::try_minutes(self.access_token_ttl_minutes)
            .ok_or(TokenConfigError::TtlTooLarge(self.access_token_ttl_minutes))
    }

    pub fn validate(&self) -> Result<(), TokenConfigError> {
        if self.secret.is_empty() {
            return Err(TokenConfigError::EmptySecret);
        }
        if self.secret.len() < 32 {
            tracing::warn!("token secret is shorter than recommended (32 bytes)");
        }
        if !matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenConfigError::UnsupportedAlgorithm(self.algorithm));
        }
        if self.access_token_ttl_minutes <= 0 {
            return Err(TokenConfigError::NonPositiveTtl(self.access_token_ttl_minutes));
        }
        if self.access_token_ttl_minutes > MAX_ACCESS_TOKEN_TTL_MINUTES {
            return Err(TokenConfigError::TtlTooLarge(self.access_token_ttl_minutes));
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("token_type", &self.token_type)
            .field("revocation_key_prefix", &self.revocation_key_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_settings() {
        let config = TokenConfig::new("k".repeat(32));
        assert_eq!(config.algorithm, Algorithm::HS256);
        assert_eq!(config.access_token_ttl_minutes, 30);
        assert_eq!(config.token_type, "access_token");
        assert_eq!(config.revocation_key_prefix, "blacklist_token:");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_missing_secret() {
        assert_eq!(
            TokenConfig::default().validate(),
            Err(TokenConfigError::EmptySecret)
        );
    }

    #[test]
    fn rejects_asymmetric_algorithms() {
        let config = TokenConfig::new("secret").with_algorithm(Algorithm::RS256);
        assert_eq!(
            config.validate(),
            Err(TokenConfigError::UnsupportedAlgorithm(Algorithm::RS256))
        );
    }

    #[test]
    fn rejects_non_positive_ttl() {
        let config = TokenConfig::new("secret").with_ttl_minutes(0);
        assert_eq!(config.validate(), Err(TokenConfigError::NonPositiveTtl(0)));
    }

    #[test]
    fn rejects_ttl_beyond_maximum() {
        let config = TokenConfig::new("secret").with_ttl_minutes(i64::MAX);
        assert_eq!(config.validate(), Err(TokenConfigError::TtlTooLarge(i64::MAX)));
        assert_eq!(config.default_ttl(), Err(TokenConfigError::TtlTooLarge(i64::MAX)));

        let year = TokenConfig::new("secret").with_ttl_minutes(MAX_ACCESS_TOKEN_TTL_MINUTES);
        assert_eq!(year.validate(), Ok(()));
        assert_eq!(year.default_ttl(), Ok(chrono::Duration::days(365)));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = TokenConfig::new("super-secret-value");
        assert!(!format!("{config:?}").contains("super-secret-value"));
    }
}
