//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::eventsourcing::cache::CacheOptions;
use crate::eventsourcing::handler::HandlerOptions;
use crate::publisher::PublisherOptions;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// CQRS switch: with it off, events are stored without outbox rows and
    /// nothing is fanned out asynchronously.
    pub cqrs_enabled: bool,

    /// Outbox publisher: events drained per cycle
    pub publisher_batch_size: usize,

    /// Outbox publisher: backoff between cycles (disable for tests only)
    pub publisher_backoff: bool,

    /// How many times a conflicting command append is retried
    pub conflict_retries: u32,

    /// Hydrate cache switch
    pub cache_enabled: bool,

    /// Hydrate cache: max entries, 0 = unbounded
    pub cache_size: usize,

    /// Hydrate cache: entry TTL in seconds, 0 = no expiry
    pub cache_ttl_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_env("PORT", 3000)?,
            cqrs_enabled: parse_env("CQRS_ENABLED", true)?,
            publisher_batch_size: parse_env("PUBLISHER_BATCH_SIZE", 50)?,
            publisher_backoff: parse_env("PUBLISHER_BACKOFF", true)?,
            conflict_retries: parse_env("CONFLICT_RETRIES", 0)?,
            cache_enabled: parse_env("HYDRATE_CACHE_ENABLED", false)?,
            cache_size: parse_env("HYDRATE_CACHE_SIZE", 1024)?,
            cache_ttl_seconds: parse_env("HYDRATE_CACHE_TTL_SECONDS", 60)?,
        })
    }

    pub fn publisher_options(&self) -> PublisherOptions {
        PublisherOptions {
            batch_size: self.publisher_batch_size,
            backoff: self.publisher_backoff,
        }
    }

    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            conflict_retries: self.conflict_retries,
            cache: CacheOptions {
                enabled: self.cache_enabled,
                size: self.cache_size,
                ttl: Duration::from_secs(self.cache_ttl_seconds),
            },
        }
    }
}

fn parse_env<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_default() {
        assert_eq!(parse_env("EVENTLOOM_TEST_UNSET", 42u32).unwrap(), 42);
    }

    #[test]
    fn test_parse_env_invalid_value() {
        env::set_var("EVENTLOOM_TEST_BAD_PORT", "not-a-number");
        let result: Result<u16, _> = parse_env("EVENTLOOM_TEST_BAD_PORT", 3000);
        env::remove_var("EVENTLOOM_TEST_BAD_PORT");

        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
