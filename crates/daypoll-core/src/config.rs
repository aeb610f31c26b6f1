//! Configuration loading and typed config structures for Daypoll.
//!
//! The configuration lives in `daypoll.yaml`. Every field except the JWT
//! secret has a default. The secret must come from the file or from
//! `JWT_SECRET`; [`AuthConfig::secret`] refuses to hand out a missing one.
//! Environment variables override the YAML after parsing:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DRAGONFLY_URL` | `infrastructure.dragonfly_url` |
//! | `DATABASE_URL` | `infrastructure.postgres_url` |
//! | `HTTP_PORT` | `http.port` |
//! | `JWT_SECRET` | `auth.jwt_secret` |

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Value of `infrastructure.dragonfly_url` that selects the in-process store.
pub const MEMORY_STORE_URL: &str = "memory";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// No usable JWT signing secret is configured.
    #[error("auth.jwt_secret is not set (configure it or set JWT_SECRET)")]
    MissingJwtSecret,
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration. Mirrors `daypoll.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Store connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// HTTP listener.
    #[serde(default)]
    pub http: HttpConfig,

    /// Vote counting behaviour.
    #[serde(default)]
    pub voting: VotingConfig,

    /// Bearer token validation.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse_yaml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_yaml(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override fields from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override fields from any variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("DRAGONFLY_URL") {
            self.infrastructure.dragonfly_url = val;
        }
        if let Some(val) = lookup("DATABASE_URL") {
            self.infrastructure.postgres_url = Some(val);
        }
        if let Some(val) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = Some(val);
        }
        if let Some(val) = lookup("HTTP_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.http.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "Ignoring invalid HTTP_PORT"),
            }
        }
    }
}

/// Store connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Dragonfly (Redis-compatible) URL, or `memory` for the in-process store.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// `PostgreSQL` connection string for the question archive. When absent
    /// the archive is kept in memory.
    #[serde(default)]
    pub postgres_url: Option<String>,
}

impl InfrastructureConfig {
    /// Whether the in-process store was selected.
    pub fn uses_memory_store(&self) -> bool {
        self.dragonfly_url.eq_ignore_ascii_case(MEMORY_STORE_URL)
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: default_dragonfly_url(),
            postgres_url: None,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Bind address.
    #[serde(default = "default_http_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl HttpConfig {
    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

/// Vote counting behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VotingConfig {
    /// Lifetime of every day-scoped key, in seconds.
    #[serde(default = "default_poll_ttl_secs")]
    pub poll_ttl_secs: u64,

    /// Deadline for each store command, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Increment the choice count and the total in one atomic batch.
    #[serde(default = "default_atomic_tally")]
    pub atomic_tally: bool,

    /// Emit a participant alert when a poll's total reaches this value.
    #[serde(default)]
    pub participant_alert_threshold: Option<u64>,
}

impl VotingConfig {
    /// [`poll_ttl_secs`](Self::poll_ttl_secs) as a [`Duration`].
    pub const fn poll_ttl(&self) -> Duration {
        Duration::from_secs(self.poll_ttl_secs)
    }

    /// [`store_timeout_ms`](Self::store_timeout_ms) as a [`Duration`],
    /// never shorter than 1 ms.
    pub const fn store_timeout(&self) -> Duration {
        let millis = if self.store_timeout_ms == 0 {
            1
        } else {
            self.store_timeout_ms
        };
        Duration::from_millis(millis)
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            poll_ttl_secs: default_poll_ttl_secs(),
            store_timeout_ms: default_store_timeout_ms(),
            atomic_tally: default_atomic_tally(),
            participant_alert_threshold: None,
        }
    }
}

/// Bearer token validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for HS256 tokens. No default.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

impl AuthConfig {
    /// The signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingJwtSecret`] if the secret is unset or
    /// blank.
    pub fn secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingJwtSecret)
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_http_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_http_port() -> u16 {
    8081
}

const fn default_poll_ttl_secs() -> u64 {
    86_400
}

const fn default_store_timeout_ms() -> u64 {
    2_000
}

const fn default_atomic_tally() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}
