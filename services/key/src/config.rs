//! Centralized configuration for the key service.
//!
//! All configuration is loaded from `KEY_*` environment variables (optionally
//! seeded from a `.env` file) and validated at startup.

use crate::error::ConfigError;
use crate::key::{KeyGenerator, DEFAULT_KEY_LENGTH, MAX_KEY_LENGTH};
use std::env;
use std::num::NonZeroU32;
use std::time::Duration;

/// Which key store backend to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Redis server
    Redis {
        /// Connection URL
        url: String,
        /// Prefix for every entry
        namespace: String,
    },
    /// Process-local store, contents lost on exit
    Memory,
}

/// Key service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Budget for draining in-flight requests on shutdown
    pub shutdown_timeout: Duration,

    // Rate limiting
    /// One request token is replenished every `rate_limit_every`
    pub rate_limit_every: Duration,
    /// Maximum burst of requests
    pub rate_limit_burst: NonZeroU32,

    // Keys
    /// Store backend
    pub store: StoreBackend,
    /// Length of generated key ids
    pub key_length: usize,

    // Logging
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("KEY_HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&lookup, "KEY_HTTP_PORT", 24020)?;
        let request_timeout = Duration::from_secs(parse_var(&lookup, "KEY_REQUEST_TIMEOUT_SECS", 30)?);
        let shutdown_timeout =
            Duration::from_secs(parse_var(&lookup, "KEY_SHUTDOWN_TIMEOUT_SECS", 10)?);

        let every_micros: u64 = parse_var(&lookup, "KEY_RATE_LIMIT_EVERY_MICROS", 1)?;
        if every_micros == 0 {
            return Err(ConfigError::invalid(
                "KEY_RATE_LIMIT_EVERY_MICROS",
                "must be greater than zero",
            ));
        }
        let rate_limit_every = Duration::from_micros(every_micros);
        let burst: u32 = parse_var(&lookup, "KEY_RATE_LIMIT_BURST", 100)?;
        let rate_limit_burst = NonZeroU32::new(burst)
            .ok_or_else(|| ConfigError::invalid("KEY_RATE_LIMIT_BURST", "must be greater than zero"))?;

        let store = match lookup("KEY_STORE")
            .unwrap_or_else(|| "redis".to_string())
            .to_lowercase()
            .as_str()
        {
            "redis" => StoreBackend::Redis {
                url: lookup("KEY_REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
                namespace: lookup("KEY_REDIS_NAMESPACE")
                    .unwrap_or_else(|| "collection-key".to_string()),
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::invalid(
                    "KEY_STORE",
                    format!("unknown backend {other:?}, expected \"redis\" or \"memory\""),
                ))
            }
        };

        let key_length = parse_var(&lookup, "KEY_LENGTH", DEFAULT_KEY_LENGTH)?;
        if KeyGenerator::new(key_length).is_none() {
            return Err(ConfigError::invalid(
                "KEY_LENGTH",
                format!("must be between 1 and {MAX_KEY_LENGTH}"),
            ));
        }

        let log_level = lookup("KEY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = parse_var(&lookup, "KEY_LOG_JSON", false)?;

        Ok(Self {
            host,
            port,
            request_timeout,
            shutdown_timeout,
            rate_limit_every,
            rate_limit_burst,
            store,
            key_length,
            log_level,
            log_json,
        })
    }

    /// Key generator for the configured length.
    ///
    /// # Errors
    ///
    /// Returns an error if the length is out of range, which `from_lookup`
    /// already rejects.
    pub fn key_generator(&self) -> Result<KeyGenerator, ConfigError> {
        KeyGenerator::new(self.key_length)
            .ok_or_else(|| ConfigError::invalid("KEY_LENGTH", "out of range"))
    }

    /// Socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a variable, falling back to `default` when it is unset.
fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(name, format!("{e}"))),
        None => Ok(default),
    }
}
