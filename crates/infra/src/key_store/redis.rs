//! Redis-backed keyed store (shared across service instances).
//!
//! Markers are plain string keys written with `SET key value PX ttl`; Redis
//! expires them server-side. Membership is `EXISTS key`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::OnceCell;
use tracing::instrument;

use scribe_auth::{KeyStore, StoreError};

pub struct RedisKeyStore {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
}

impl RedisKeyStore {
    /// Create a store for `redis_url` (e.g. "redis://localhost:6379/0").
    ///
    /// The connection is opened lazily on first use.
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.conn
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))
            })
            .await
            .cloned()
    }

    /// Round-trip check used at startup.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("PING failed: {}", e)))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyStore")
            .field("connected", &self.conn.initialized())
            .finish()
    }
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    #[instrument(skip(self, key, value), fields(ttl_ms = ttl.as_millis() as u64), err)]
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let ttl_ms = (ttl.as_millis() as u64).max(1);

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("SET failed: {}", e)))
    }

    #[instrument(skip(self, key), err)]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;

        redis::cmd("EXISTS")
            .arg(key)
            .query_async::<_, bool>(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("EXISTS failed: {}", e)))
    }
}
