//! Configuration management for the filedrop server.
//!
//! Configuration is assembled once at startup from four layers, each one
//! overriding the previous: built-in defaults, an optional TOML file, `FILEDROP_*`
//! environment variables, and command-line flags. The default configuration path
//! is `~/.config/filedrop/config.toml`.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("bind_address must be an IP address, got {0}")]
    InvalidBindAddress(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Default shared password when none is configured.
pub const DEFAULT_PASSWORD: &str = "password";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Main configuration structure for the filedrop server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Listener and logging configuration.
    pub server: ServerConfig,

    /// Storage directory configuration.
    pub storage: StorageConfig,

    /// Shared password configuration.
    pub auth: AuthConfig,
}

/// Listener and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to listen on.
    pub bind_address: String,

    /// TCP port to listen on. `0` picks an ephemeral port.
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Storage directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory uploads are saved into and the listing is generated from.
    pub dir: PathBuf,

    /// Directory download names are resolved against.
    pub download_root: DownloadRoot,
}

/// Where `GET /download/:filename` looks for the named file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadRoot {
    /// Resolve names inside the storage directory.
    #[default]
    Storage,
    /// Resolve names relative to the process working directory.
    WorkingDir,
}

/// Shared password configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Password compared verbatim against uploads and downloads.
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            download_root: DownloadRoot::Storage,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// Values supplied on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub dir: Option<PathBuf>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub download_from_cwd: bool,
    pub verbose: bool,
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filedrop")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEDROP_DIR: Override storage directory
    /// - FILEDROP_PASSWORD: Override shared password
    /// - FILEDROP_PORT: Override listen port
    /// - FILEDROP_BIND: Override bind address
    /// - FILEDROP_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = non_empty_env("FILEDROP_DIR") {
            tracing::info!("Overriding storage dir from environment: {}", dir);
            self.storage.dir = PathBuf::from(dir);
        }

        if let Some(password) = non_empty_env("FILEDROP_PASSWORD") {
            tracing::info!("Overriding password from environment");
            self.auth.password = password;
        }

        if let Some(port) = non_empty_env("FILEDROP_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Overriding port from environment: {}", port);
                    self.server.port = port;
                }
                Err(e) => {
                    tracing::warn!(value = %port, error = %e, "Ignoring invalid FILEDROP_PORT");
                }
            }
        }

        if let Some(bind) = non_empty_env("FILEDROP_BIND") {
            tracing::info!("Overriding bind_address from environment: {}", bind);
            self.server.bind_address = bind;
        }

        if let Some(level) = non_empty_env("FILEDROP_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.server.log_level = level;
        }
    }

    /// Apply command-line overrides. These win over every other layer.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(dir) = overrides.dir {
            self.storage.dir = dir;
        }
        if let Some(password) = overrides.password {
            self.auth.password = password;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if overrides.download_from_cwd {
            self.storage.download_root = DownloadRoot::WorkingDir;
        }
        if overrides.verbose {
            self.server.log_level = "debug".to_string();
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.password.is_empty() {
            return Err(ConfigError::EmptyPassword);
        }

        self.socket_addr()?;

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        Ok(())
    }

    /// The address the HTTP listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
