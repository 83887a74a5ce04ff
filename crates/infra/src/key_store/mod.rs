//! Keyed-store backends for the revocation ledger.
//!
//! The ledger logic lives in `scribe-auth`; these are the `KeyStore`
//! implementations it runs against.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::InMemoryKeyStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisKeyStore;
