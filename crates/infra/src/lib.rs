//! Infrastructure layer: keyed-store backends, configuration, in-memory
//! account and ownership collaborators.

pub mod config;
pub mod directory;
pub mod key_store;

pub use config::{AdminAccount, ConfigError, RedisSettings, Settings};
