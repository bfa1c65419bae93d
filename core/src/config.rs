//! Client configuration.
//!
//! `WebserviceConfig` can be deserialized from any serde source or read
//! from `PRESTASHOP_*` environment variables.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of requests in flight per concurrent batch.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 25;

pub const ENV_URL: &str = "PRESTASHOP_URL";
pub const ENV_API_KEY: &str = "PRESTASHOP_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "PRESTASHOP_TIMEOUT_SECS";
pub const ENV_CONCURRENCY: &str = "PRESTASHOP_CONCURRENCY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebserviceConfig {
    /// Shop root, e.g. `https://shop.example.com`.
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

impl WebserviceConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(ENV_URL).ok_or(ConfigError::Missing(ENV_URL))?;
        let api_key = lookup(ENV_API_KEY).ok_or(ConfigError::Missing(ENV_API_KEY))?;
        let mut config = Self::new(base_url, api_key);
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = parse_positive(ENV_TIMEOUT_SECS, value)?;
        }
        if let Some(value) = lookup(ENV_CONCURRENCY) {
            config.concurrency_limit = parse_positive(ENV_CONCURRENCY, value)?;
        }
        Ok(config)
    }
}

/// Parse a setting that must be a number greater than zero.
fn parse_positive<N>(name: &'static str, value: String) -> Result<N, ConfigError>
where
    N: std::str::FromStr + PartialEq + Default,
{
    match value.trim().parse::<N>() {
        Ok(number) if number != N::default() => Ok(number),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
