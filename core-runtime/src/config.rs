//! # Server Configuration
//!
//! Configuration for the login service.
//!
//! ## Overview
//!
//! A [`ServerConfig`] is assembled through [`ServerConfigBuilder`] and checked
//! once in [`ServerConfigBuilder::build`]. Invalid settings fail fast with
//! [`Error::Config`] instead of surfacing later as a broken redirect or a
//! database that never opens.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{ProviderSeed, ServerConfig};
//!
//! let config = ServerConfig::builder()
//!     .public_base_url("https://trips.example.com")
//!     .database_url("sqlite::memory:")
//!     .provider(ProviderSeed::new("google", "client-id", "client-secret"))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.providers.len(), 1);
//! ```
//!
//! ## Environment
//!
//! [`ServerConfig::from_env`] reads:
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `WLOCZYKIJ_BIND` | `bind_address` |
//! | `WLOCZYKIJ_BASE_URL` | `public_base_url` |
//! | `DATABASE_URL` | `database_url` |
//! | `WLOCZYKIJ_HTTP_TIMEOUT_SECS` | `http_timeout` |
//! | `WLOCZYKIJ_LOG_FORMAT` | `log_format` (`pretty`, `json`, `compact`) |
//! | `RUST_LOG` | `log_filter` |
//! | `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` | Google provider seed |
//! | `FACEBOOK_CLIENT_ID` / `FACEBOOK_CLIENT_SECRET` | Facebook provider seed |

use crate::error::{Error, Result};
use crate::logging::LogFormat;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://wloczykij.db";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Provider credentials loaded at startup and upserted into storage.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSeed {
    /// Provider name, e.g. `google` or `facebook`
    pub name: String,
    /// OAuth client id (the consumer key)
    pub consumer_key: String,
    /// OAuth client secret
    pub consumer_secret: String,
    /// Whether logins through this provider are accepted
    pub enabled: bool,
}

impl ProviderSeed {
    pub fn new(
        name: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for ProviderSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSeed")
            .field("name", &self.name)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Configuration for the login service.
///
/// Use [`ServerConfig::builder`] to construct instances.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the HTTP server listens on
    pub bind_address: SocketAddr,

    /// Externally visible base URL, used to build OAuth `redirect_uri` values
    pub public_base_url: Url,

    /// sqlx connection string for the SQLite database
    pub database_url: String,

    /// Overall timeout for a single outbound provider call
    pub http_timeout: Duration,

    /// Connect timeout for outbound provider calls
    pub connect_timeout: Duration,

    /// Log output format
    pub log_format: LogFormat,

    /// Optional `EnvFilter` directive string
    pub log_filter: Option<String>,

    /// Providers to upsert at startup
    pub providers: Vec<ProviderSeed>,
}

impl ServerConfig {
    /// Creates a new builder for constructing a `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// `from_env` is this function applied to `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(bind) = lookup("WLOCZYKIJ_BIND") {
            builder = builder.bind_address(bind);
        }
        if let Some(base) = lookup("WLOCZYKIJ_BASE_URL") {
            builder = builder.public_base_url(base);
        }
        if let Some(db) = lookup("DATABASE_URL") {
            builder = builder.database_url(db);
        }
        if let Some(secs) = lookup("WLOCZYKIJ_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "WLOCZYKIJ_HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    secs
                ))
            })?;
            builder = builder.http_timeout(Duration::from_secs(secs));
        }
        if let Some(format) = lookup("WLOCZYKIJ_LOG_FORMAT") {
            builder = builder.log_format(format.parse()?);
        }
        if let Some(filter) = lookup("RUST_LOG") {
            builder = builder.log_filter(filter);
        }

        for (name, prefix) in [("google", "GOOGLE"), ("facebook", "FACEBOOK")] {
            let Some(client_id) = lookup(&format!("{}_CLIENT_ID", prefix)) else {
                continue;
            };
            let secret_key = format!("{}_CLIENT_SECRET", prefix);
            let client_secret = lookup(&secret_key).ok_or_else(|| Error::MissingSetting {
                setting: secret_key.clone(),
                message: format!("{}_CLIENT_ID is set but its secret is not", prefix),
            })?;
            builder = builder.provider(ProviderSeed::new(name, client_id, client_secret));
        }

        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("Database URL cannot be empty".to_string()));
        }

        if self.public_base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Public base URL '{}' cannot be used as a base",
                self.public_base_url
            )));
        }

        if self.http_timeout.is_zero() {
            return Err(Error::Config(
                "HTTP timeout must be greater than zero".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::Config(
                "Connect timeout must be greater than zero".to_string(),
            ));
        }

        for (index, seed) in self.providers.iter().enumerate() {
            if seed.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Provider #{} has an empty name",
                    index
                )));
            }
            if seed.consumer_key.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Provider '{}' has an empty consumer key",
                    seed.name
                )));
            }
            if self.providers[..index]
                .iter()
                .any(|other| other.name == seed.name)
            {
                return Err(Error::Config(format!(
                    "Provider '{}' is configured twice",
                    seed.name
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    bind_address: Option<String>,
    public_base_url: Option<String>,
    database_url: Option<String>,
    http_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    log_format: Option<LogFormat>,
    log_filter: Option<String>,
    providers: Vec<ProviderSeed>,
}

impl ServerConfigBuilder {
    /// Sets the listen address. Default: `127.0.0.1:8000`
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = Some(address.into());
        self
    }

    /// Sets the externally visible base URL.
    ///
    /// Defaults to `http://<bind_address>/`.
    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Default: 10 seconds
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Adds a provider to seed at startup.
    pub fn provider(mut self, seed: ProviderSeed) -> Self {
        self.providers.push(seed);
        self
    }

    /// Builds the `ServerConfig`, validating every setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when an address or URL cannot be parsed or a
    /// value fails validation.
    pub fn build(self) -> Result<ServerConfig> {
        let bind = self
            .bind_address
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address: SocketAddr = bind.parse().map_err(|e| {
            Error::Config(format!("Invalid bind address '{}': {}", bind, e))
        })?;

        let base = self
            .public_base_url
            .unwrap_or_else(|| format!("http://{}/", bind_address));
        let public_base_url = parse_base_url(&base)?;

        let config = ServerConfig {
            bind_address,
            public_base_url,
            database_url: self
                .database_url
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            http_timeout: self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            log_format: self.log_format.unwrap_or_default(),
            log_filter: self.log_filter,
            providers: self.providers,
        };

        config.validate()?;

        Ok(config)
    }
}

// `Url::join` drops the last path segment unless it ends in a slash.
fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized)
        .map_err(|e| Error::Config(format!("Invalid public base URL '{}': {}", raw, e)))
}
