//! Single-process expiring map.
//!
//! Substitute for the shared store when only one instance runs (dev/test).
//! One mutex guards the map; entries stop existing at their deadline and are
//! pruned lazily on write.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use scribe_auth::{KeyStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    inner: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries that have not yet expired.
    pub fn live_entries(&self) -> usize {
        let now = Instant::now();
        match self.inner.lock() {
            Ok(map) => map.values().filter(|e| e.expires_at > now).count(),
            Err(_) => 0,
        }
    }

    /// Value stored under `key`, if still live.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let map = self.inner.lock().ok()?;
        map.get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }
}

fn poisoned() -> StoreError {
    StoreError::Command("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut map = self.inner.lock().map_err(|_| poisoned())?;
        map.retain(|_, e| e.expires_at > now);
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let map = self.inner.lock().map_err(|_| poisoned())?;
        Ok(map.get(key).is_some_and(|e| e.expires_at > now))
    }
}
