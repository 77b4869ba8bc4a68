use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::middleware::BasicCredentials;

/// Server configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub max_connections: u32,
    pub credentials: BasicCredentials,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: "sqlite://bazaar.db".to_string(),
            max_connections: 10,
            credentials: BasicCredentials::new("admin", "password"),
            rate_limit_max: 40,
            rate_limit_window: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

/// Read `var` and parse it, falling back to `default` when unset or empty.
fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    msg: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(var, msg)),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// DATABASE_URL defaults to "sqlite://bazaar.db"
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.database_url);

        let listen_addr = parse_var(
            &lookup,
            "LISTEN_ADDR",
            defaults.listen_addr,
            "must be a valid socket address",
        )?;

        let max_connections = parse_var(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            defaults.max_connections,
            "must be a positive integer",
        )?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid(
                "DATABASE_MAX_CONNECTIONS",
                "must be a positive integer",
            ));
        }

        let credentials = BasicCredentials::new(
            lookup("BASIC_AUTH_USER")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.credentials.username),
            lookup("BASIC_AUTH_PASS")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.credentials.password),
        );

        let rate_limit_max = parse_var(
            &lookup,
            "RATE_LIMIT_MAX",
            defaults.rate_limit_max,
            "must be a positive integer",
        )?;
        if rate_limit_max == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_MAX", "must be a positive integer"));
        }

        let window_secs = parse_var(
            &lookup,
            "RATE_LIMIT_WINDOW_SECS",
            defaults.rate_limit_window.as_secs(),
            "must be a positive number of seconds",
        )?;
        if window_secs == 0 {
            return Err(ConfigError::Invalid(
                "RATE_LIMIT_WINDOW_SECS",
                "must be a positive number of seconds",
            ));
        }

        let timeout_secs = parse_var(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
            "must be a positive number of seconds",
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "REQUEST_TIMEOUT_SECS",
                "must be a positive number of seconds",
            ));
        }

        Ok(Config {
            listen_addr,
            database_url,
            max_connections,
            credentials,
            rate_limit_max,
            rate_limit_window: Duration::from_secs(window_secs),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
