//! Revocation ledger: a lifetime-bounded denylist of credentials.
//!
//! Markers live in a shared keyed store with native per-entry expiry so every
//! service instance sees the same view and entries prune themselves. A
//! marker's TTL equals the remaining validity of the credential it revokes,
//! so no marker outlives its credential.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::token::TokenCodec;

const MARKER_VALUE: &str = "1";

/// Failure talking to the shared keyed store.
///
/// Always surfaced; never read as "not revoked".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("keyed store connection error: {0}")]
    Connection(String),

    #[error("keyed store command error: {0}")]
    Command(String),
}

/// Keyed store with server-side per-entry expiry (`SET key value EX ttl`, `EXISTS key`).
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> KeyStore for Arc<S>
where
    S: KeyStore + ?Sized,
{
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).set_with_ttl(key, value, ttl).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key).await
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevokeError {
    /// The credential could not be decoded or its signature did not verify.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a revoke call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// A marker was written and expires after `ttl`.
    Revoked { ttl: Duration },

    /// The credential had already expired; no marker was written.
    AlreadyExpired,
}

pub struct RevocationLedger<S> {
    store: S,
    codec: TokenCodec,
    key_prefix: String,
}

impl<S: KeyStore> RevocationLedger<S> {
    pub fn new(store: S, codec: TokenCodec, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            codec,
            key_prefix: key_prefix.into(),
        }
    }

    /// Store key for a credential: the prefix followed by its exact encoded form.
    pub fn marker_key(&self, raw: &str) -> String {
        format!("{}{}", self.key_prefix, raw)
    }

    pub async fn revoke(&self, raw: &str) -> Result<RevokeOutcome, RevokeError> {
        self.revoke_at(raw, Utc::now()).await
    }

    /// Record that `raw` must no longer be honoured.
    ///
    /// The signature is checked but expiry is not: an expired credential is
    /// a no-op (`AlreadyExpired`), not an error.
    pub async fn revoke_at(
        &self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, RevokeError> {
        let claims = self
            .codec
            .decode(raw)
            .map_err(|e| RevokeError::InvalidCredential(e.to_string()))?;

        let remaining = claims.exp - now.timestamp();
        if remaining <= 0 {
            debug!(sub = %claims.sub, "credential already expired; no revocation marker written");
            return Ok(RevokeOutcome::AlreadyExpired);
        }

        let ttl = Duration::from_secs(remaining as u64);
        self.store
            .set_with_ttl(&self.marker_key(raw), MARKER_VALUE, ttl)
            .await?;

        info!(sub = %claims.sub, ttl_secs = remaining, "credential revoked");
        Ok(RevokeOutcome::Revoked { ttl })
    }

    /// Pure membership test. Does not decode or validate the credential.
    pub async fn is_revoked(&self, raw: &str) -> Result<bool, StoreError> {
        self.store.exists(&self.marker_key(raw)).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    use super::*;

    /// Minimal expiring map used by this crate's tests.
    #[derive(Default)]
    pub struct MemoryStore {
        entries: Mutex<HashMap<String, (String, Duration, Instant)>>,
        pub fail: AtomicBool,
    }

    impl MemoryStore {
        pub fn ttl_of(&self, key: &str) -> Option<Duration> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl, _)| *ttl)
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        pub fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KeyStore for MemoryStore {
        async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
            self.check()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl, Instant::now() + ttl));
            Ok(())
        }

        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            self.check()?;
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(key)
                .is_some_and(|(_, _, deadline)| Instant::now() < *deadline))
        }
    }
}
