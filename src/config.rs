//! Configuration for the cache service connection.

use std::env;

use crate::error::{Error, Result};

/// Environment variable holding the cache service base URL.
pub const ENV_CACHE_URL: &str = "ACTIONS_CACHE_URL";

/// Environment variable holding the bearer token.
pub const ENV_RUNTIME_TOKEN: &str = "ACTIONS_RUNTIME_TOKEN";

/// Connection settings for the cache service.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache service base URL.
    pub base_url: String,
    /// Bearer token presented on every API request.
    pub token: String,
}

impl CacheConfig {
    /// Creates a new configuration.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Builds a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either variable is unset or empty.
    /// No network activity is attempted.
    pub fn from_env() -> Result<Self> {
        let base_url = require(ENV_CACHE_URL)?;
        let token = require(ENV_RUNTIME_TOKEN)?;
        Ok(Self { base_url, token })
    }
}

fn require(name: &'static str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::MissingConfig(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the env mutations cannot race each other.
    #[test]
    fn from_env_requires_both_values() {
        env::remove_var(ENV_CACHE_URL);
        env::remove_var(ENV_RUNTIME_TOKEN);
        assert!(matches!(
            CacheConfig::from_env(),
            Err(Error::MissingConfig(ENV_CACHE_URL))
        ));

        env::set_var(ENV_CACHE_URL, "https://cache.example.com");
        assert!(matches!(
            CacheConfig::from_env(),
            Err(Error::MissingConfig(ENV_RUNTIME_TOKEN))
        ));

        env::set_var(ENV_RUNTIME_TOKEN, "");
        assert!(matches!(
            CacheConfig::from_env(),
            Err(Error::MissingConfig(ENV_RUNTIME_TOKEN))
        ));

        env::set_var(ENV_RUNTIME_TOKEN, "secret");
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://cache.example.com");
        assert_eq!(config.token, "secret");

        env::remove_var(ENV_CACHE_URL);
        env::remove_var(ENV_RUNTIME_TOKEN);
    }
}
