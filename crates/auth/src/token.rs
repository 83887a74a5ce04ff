//! Access-token issuance and verification.
//!
//! Per-credential lifecycle: `ISSUED -> VALID (now < exp, not revoked) -> EXPIRED | REVOKED`.
//! Both terminal states are absorbing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::claims::{Claims, RESERVED_CLAIMS, TokenValidationError, validate_claims};
use crate::config::{TokenConfig, TokenConfigError};
use crate::revocation::{KeyStore, RevocationLedger, RevokeError, RevokeOutcome, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("credential has been revoked")]
    Revoked,

    #[error("credential has expired")]
    Expired,

    /// Structural, signature, algorithm or token-kind failure.
    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("failed to sign credential: {0}")]
    Signing(String),

    /// `now + ttl` is not a representable instant.
    #[error("credential lifetime out of range")]
    TtlOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TokenValidationError> for TokenError {
    fn from(value: TokenValidationError) -> Self {
        match value {
            TokenValidationError::Expired => TokenError::Expired,
        }
    }
}

// =============================================================================
// TokenCodec
// =============================================================================

/// Signs and decodes access tokens with the configured symmetric key.
///
/// Decoding checks structure, algorithm and signature only; the time window is
/// checked by the caller so that revocation can size markers from `exp`.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    token_type: Arc<str>,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenCodec {
    pub fn new(config: &TokenConfig) -> Result<Self, TokenConfigError> {
        config.validate()?;

        let mut validation = Validation::new(config.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            algorithm: config.algorithm,
            token_type: Arc::from(config.token_type.as_str()),
            encoding_key: Arc::new(EncodingKey::from_secret(config.secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.secret.as_bytes())),
            validation: Arc::new(validation),
        })
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Build and sign a claim set for `subject` valid for `ttl` from `now`.
    ///
    /// Extra claims named like a reserved claim are dropped.
    pub fn mint(
        &self,
        subject: &str,
        now: DateTime<Utc>,
        ttl: Duration,
        extra: Map<String, Value>,
    ) -> Result<String, TokenError> {
        let extra: Map<String, Value> = extra
            .into_iter()
            .filter(|(name, _)| {
                let reserved = RESERVED_CLAIMS.contains(&name.as_str());
                if reserved {
                    warn!(claim = %name, "ignoring extra claim that shadows a reserved claim");
                }
                !reserved
            })
            .collect();

        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::TtlOutOfRange)?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            token_type: self.token_type.to_string(),
            extra,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Decode and verify the signature of `raw` without checking expiry.
    pub fn decode(&self, raw: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(raw, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("token_type", &self.token_type)
            .finish()
    }
}

// =============================================================================
// TokenService
// =============================================================================

/// Issues, verifies and revokes access tokens.
pub struct TokenService<S> {
    codec: TokenCodec,
    ledger: RevocationLedger<S>,
    default_ttl: Duration,
}

impl<S: KeyStore> TokenService<S> {
    pub fn new(config: &TokenConfig, store: S) -> Result<Self, TokenConfigError> {
        let codec = TokenCodec::new(config)?;
        let ledger = RevocationLedger::new(store, codec.clone(), config.revocation_key_prefix.clone());

        Ok(Self {
            codec,
            ledger,
            default_ttl: config.default_ttl()?,
        })
    }

    pub fn ledger(&self) -> &RevocationLedger<S> {
        &self.ledger
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a signed credential for `subject`.
    ///
    /// `ttl` defaults to the configured lifetime; `extra` (e.g. `role`) is
    /// merged into the signed payload.
    pub fn issue(
        &self,
        subject: &str,
        ttl: Option<Duration>,
        extra: Map<String, Value>,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, ttl, extra, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        ttl: Option<Duration>,
        extra: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let token = self.codec.mint(subject, now, ttl, extra)?;
        debug!(sub = %subject, ttl_secs = ttl.num_seconds(), "issued access token");
        Ok(token)
    }

    pub async fn verify(&self, raw: &str) -> Result<Claims, TokenError> {
        self.verify_at(raw, Utc::now()).await
    }

    /// Verify `raw` and return its claims.
    ///
    /// Order: revocation check, then signature, then expiry. A revoked token
    /// is rejected before any cryptographic work.
    pub async fn verify_at(&self, raw: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        if self.ledger.is_revoked(raw).await? {
            return Err(TokenError::Revoked);
        }

        let claims = self
            .codec
            .decode(raw)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        if claims.token_type != self.codec.token_type() {
            return Err(TokenError::Malformed(format!(
                "unexpected token type '{}'",
                claims.token_type
            )));
        }

        validate_claims(&claims, now)?;
        Ok(claims)
    }

    /// `verify` with every failure folded into `false`.
    pub async fn is_valid(&self, raw: &str) -> bool {
        self.verify(raw).await.is_ok()
    }

    pub async fn revoke(&self, raw: &str) -> Result<RevokeOutcome, RevokeError> {
        self.ledger.revoke(raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use crate::revocation::test_support::MemoryStore;
    use proptest::prelude::*;
    use serde_json::json;

    const SECRET: &str = "token-service-test-secret-0123456789";

    fn service() -> (Arc<MemoryStore>, TokenService<Arc<MemoryStore>>) {
        let store = Arc::new(MemoryStore::default());
        let service = TokenService::new(&TokenConfig::new(SECRET), store.clone()).unwrap();
        (store, service)
    }

    fn role_claim(role: &str) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert("role".to_string(), json!(role));
        extra
    }

    #[tokio::test]
    async fn issue_verify_revoke_scenario() {
        let (_store, tokens) = service();
        let token = tokens
            .issue("a@x.com", Some(Duration::minutes(15)), role_claim("admin"))
            .unwrap();

        let claims = tokens.verify(&token).await.unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.token_type, "access_token");
        assert_eq!(claims.get("role"), Some(&json!("admin")));
        assert_eq!(claims.role(), Some(Role::Admin));

        tokens.revoke(&token).await.unwrap();
        assert!(tokens.ledger().is_revoked(&token).await.unwrap());
        assert_eq!(tokens.verify(&token).await, Err(TokenError::Revoked));
    }

    #[tokio::test]
    async fn default_ttl_is_thirty_minutes() {
        let (_store, tokens) = service();
        let now = Utc::now();
        let token = tokens.issue_at("a@x.com", None, Map::new(), now).unwrap();
        let claims = tokens.verify_at(&token, now).await.unwrap();
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[tokio::test]
    async fn negative_ttl_is_immediately_expired() {
        let (_store, tokens) = service();
        let token = tokens
            .issue("a@x.com", Some(Duration::seconds(-1)), Map::new())
            .unwrap();
        assert_eq!(tokens.verify(&token).await, Err(TokenError::Expired));
        assert!(!tokens.is_valid(&token).await);
    }

    #[tokio::test]
    async fn unrepresentable_ttl_is_an_error() {
        let (_store, tokens) = service();
        assert_eq!(
            tokens.issue("a@x.com", Some(Duration::MAX), Map::new()),
            Err(TokenError::TtlOutOfRange)
        );
        assert_eq!(
            tokens.issue("a@x.com", Some(Duration::MIN), Map::new()),
            Err(TokenError::TtlOutOfRange)
        );
    }

    #[test]
    fn oversized_configured_ttl_is_rejected_at_construction() {
        let config = TokenConfig::new(SECRET).with_ttl_minutes(i64::MAX);
        assert!(matches!(
            TokenService::new(&config, Arc::new(MemoryStore::default())),
            Err(TokenConfigError::TtlTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn expires_at_exact_boundary() {
        let (_store, tokens) = service();
        let now = Utc::now();
        let token = tokens
            .issue_at("a@x.com", Some(Duration::seconds(10)), Map::new(), now)
            .unwrap();

        assert!(tokens.verify_at(&token, now + Duration::seconds(9)).await.is_ok());
        assert_eq!(
            tokens.verify_at(&token, now + Duration::seconds(10)).await,
            Err(TokenError::Expired)
        );
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let (_store, tokens) = service();
        assert!(matches!(
            tokens.verify("invalid_token").await,
            Err(TokenError::Malformed(_))
        ));
        assert!(!tokens.is_valid("invalid_token").await);
    }

    #[tokio::test]
    async fn tampered_signature_is_malformed() {
        let (_store, tokens) = service();
        let token = tokens.issue("a@x.com", None, Map::new()).unwrap();
        let other = TokenService::new(
            &TokenConfig::new("another-secret-entirely-0123456789"),
            Arc::new(MemoryStore::default()),
        )
        .unwrap();

        assert!(matches!(other.verify(&token).await, Err(TokenError::Malformed(_))));
    }

    #[tokio::test]
    async fn algorithm_mismatch_is_malformed() {
        let (_store, tokens) = service();
        let hs512 = TokenService::new(
            &TokenConfig::new(SECRET).with_algorithm(Algorithm::HS512),
            Arc::new(MemoryStore::default()),
        )
        .unwrap();
        let token = hs512.issue("a@x.com", None, Map::new()).unwrap();

        assert!(matches!(tokens.verify(&token).await, Err(TokenError::Malformed(_))));
    }

    #[tokio::test]
    async fn foreign_token_kind_is_malformed() {
        let (_store, tokens) = service();
        let mut config = TokenConfig::new(SECRET);
        config.token_type = "refresh_token".to_string();
        let refresh = TokenCodec::new(&config).unwrap();
        let token = refresh
            .mint("a@x.com", Utc::now(), Duration::minutes(5), Map::new())
            .unwrap();

        assert!(matches!(tokens.verify(&token).await, Err(TokenError::Malformed(_))));
    }

    #[tokio::test]
    async fn revoked_check_precedes_expiry_check() {
        let (_store, tokens) = service();
        let now = Utc::now();
        let token = tokens
            .issue_at("a@x.com", Some(Duration::seconds(30)), Map::new(), now)
            .unwrap();
        tokens.ledger().revoke_at(&token, now).await.unwrap();

        // Still inside the marker's lifetime but past expiry for the verifier.
        assert_eq!(
            tokens.verify_at(&token, now + Duration::minutes(1)).await,
            Err(TokenError::Revoked)
        );
    }

    #[tokio::test]
    async fn extra_claims_cannot_override_expiry() {
        let (_store, tokens) = service();
        let now = Utc::now();
        let mut extra = role_claim("author");
        extra.insert("exp".to_string(), json!(now.timestamp() + 10_000_000));
        extra.insert("sub".to_string(), json!("mallory@x.com"));

        let token = tokens
            .issue_at("a@x.com", Some(Duration::minutes(1)), extra, now)
            .unwrap();
        let claims = tokens.verify_at(&token, now).await.unwrap();

        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.exp, now.timestamp() + 60);
        assert_eq!(claims.role(), Some(Role::Author));
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_infrastructure_error() {
        let (store, tokens) = service();
        let token = tokens.issue("a@x.com", None, Map::new()).unwrap();
        store.set_failing(true);

        assert!(matches!(
            tokens.verify(&token).await,
            Err(TokenError::Store(StoreError::Connection(_)))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: verify(issue(subject, ttl, claims)) returns the subject and
        /// the extra claims unchanged.
        #[test]
        fn issue_verify_round_trip(
            subject in "[a-z]{1,12}@[a-z]{1,8}\\.com",
            ttl_secs in 1i64..86_400,
            role in prop::sample::select(vec!["admin", "author", "reader"]),
            tags in prop::collection::vec("[a-z]{1,6}", 0..4),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (_store, tokens) = service();

            let mut extra = role_claim(role);
            extra.insert("tags".to_string(), json!(tags));

            let now = Utc::now();
            let token = tokens
                .issue_at(&subject, Some(Duration::seconds(ttl_secs)), extra.clone(), now)
                .unwrap();
            let claims = rt.block_on(tokens.verify_at(&token, now)).unwrap();

            prop_assert_eq!(claims.sub, subject);
            prop_assert_eq!(claims.extra, extra);
        }
    }
}
