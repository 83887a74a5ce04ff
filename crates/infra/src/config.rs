//! Configuration loading from the process environment.
//!
//! Variables:
//! - `SECRET_KEY` (required): token signing secret
//! - `ALGORITHM` (default `HS256`)
//! - `ACCESS_TOKEN_EXPIRE_MINUTES` (default 30)
//! - `REDIS_HOST` / `REDIS_PORT` / `REDIS_DB` / `REDIS_PASSWORD`
//! - `USE_REDIS` (default false: single-process in-memory revocation store)
//! - `BIND_ADDR` (default `0.0.0.0:8080`)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` (optional): account seeded with the admin role

use std::str::FromStr;

use thiserror::Error;

use scribe_auth::config::Algorithm;
use scribe_auth::{TokenConfig, TokenConfigError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Token(#[from] TokenConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl RedisSettings {
    pub fn url(&self) -> String {
        match &self.password {
            Some(pw) => format!("redis://:{}@{}:{}/{}", pw, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub token: TokenConfig,
    pub redis: RedisSettings,
    pub use_redis: bool,
    pub bind_addr: String,
    pub bootstrap_admin: Option<AdminAccount>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAccount")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("SECRET_KEY")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("SECRET_KEY"))?;

        let mut token = TokenConfig::new(secret);
        if let Some(raw) = lookup("ALGORITHM") {
            token.algorithm = Algorithm::from_str(raw.trim()).map_err(|e| ConfigError::Invalid {
                key: "ALGORITHM",
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(minutes) = parse_opt::<i64>(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES")? {
            token.access_token_ttl_minutes = minutes;
        }
        token.validate()?;

        let defaults = RedisSettings::default();
        let redis = RedisSettings {
            host: lookup("REDIS_HOST").unwrap_or(defaults.host),
            port: parse_opt(&lookup, "REDIS_PORT")?.unwrap_or(defaults.port),
            db: parse_opt(&lookup, "REDIS_DB")?.unwrap_or(defaults.db),
            password: lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()),
        };

        Ok(Self {
            token,
            redis,
            use_redis: parse_opt(&lookup, "USE_REDIS")?.unwrap_or(false),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            bootstrap_admin: bootstrap_admin(&lookup)?,
        })
    }

    pub fn redis_url(&self) -> String {
        self.redis.url()
    }
}

/// Empty values count as unset; exactly one of the pair set is an error.
fn bootstrap_admin(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<AdminAccount>, ConfigError> {
    let email = lookup("ADMIN_EMAIL").filter(|v| !v.trim().is_empty());
    let password = lookup("ADMIN_PASSWORD").filter(|v| !v.is_empty());

    match (email, password) {
        (Some(email), Some(password)) => Ok(Some(AdminAccount { email, password })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Missing("ADMIN_PASSWORD")),
        (None, Some(_)) => Err(ConfigError::Missing("ADMIN_EMAIL")),
    }
}

fn parse_opt<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
