//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (PARLOR_*), including a `.env` file
//! - TOML configuration file

use anyhow::{Context, Result};
use parlor_core::{RoomConfig, SweeperConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Storage configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Eviction configuration.
    #[serde(default)]
    pub sweeper: SweeperSection,

    /// Input limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Which store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Keep everything in process memory.
    Memory,
    /// Persist to a SQLite database.
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to use.
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Database URL for the SQLite backend.
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

/// Eviction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperSection {
    /// Time between sweeps in milliseconds.
    #[serde(default = "default_sweep_interval")]
    pub interval_ms: u64,

    /// Idle time before eviction in milliseconds.
    #[serde(default = "default_stale_after")]
    pub stale_after_ms: u64,
}

/// Input limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum participant name length, in characters.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,

    /// Maximum message text length, in bytes.
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Maximum request body size, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("PARLOR_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("PARLOR_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000)
}

fn default_backend() -> StoreBackend {
    match std::env::var("PARLOR_STORE").as_deref() {
        Ok("sqlite") => StoreBackend::Sqlite,
        _ => StoreBackend::Memory,
    }
}

fn default_database_url() -> String {
    std::env::var("PARLOR_DATABASE_URL").unwrap_or_else(|_| "sqlite://parlor.db".to_string())
}

fn default_sweep_interval() -> u64 {
    15_000 // 15 seconds
}

fn default_stale_after() -> u64 {
    10_000 // 10 seconds
}

fn default_max_name_length() -> usize {
    parlor_core::room::DEFAULT_MAX_NAME_LENGTH
}

fn default_max_text_length() -> usize {
    parlor_core::room::DEFAULT_MAX_TEXT_LENGTH
}

fn default_max_body_bytes() -> usize {
    128 * 1024 // 128 KB
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store: StoreConfig::default(),
            sweeper: SweeperSection::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: default_database_url(),
        }
    }
}

impl Default for SweeperSection {
    fn default() -> Self {
        Self {
            interval_ms: default_sweep_interval(),
            stale_after_ms: default_stale_after(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_name_length: default_max_name_length(),
            max_text_length: default_max_text_length(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "parlor.toml",
            "/etc/parlor/parlor.toml",
            "~/.config/parlor/parlor.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it
    /// fails [`Config::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reject settings the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweep interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.sweeper.interval_ms == 0 {
            anyhow::bail!("sweeper.interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}:{}", self.host, self.port))
    }

    /// Room limits derived from this configuration.
    #[must_use]
    pub fn room(&self) -> RoomConfig {
        RoomConfig {
            max_name_length: self.limits.max_name_length,
            max_text_length: self.limits.max_text_length,
        }
    }

    /// Sweeper settings derived from this configuration.
    #[must_use]
    pub fn sweeper(&self) -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_millis(self.sweeper.interval_ms),
            stale_after: Duration::from_millis(self.sweeper.stale_after_ms),
        }
    }
}
