//! # Configuration Management
//!
//! Centralized configuration for the paging server and client.
//!
//! This module provides structured configuration for both peers: listen and
//! connect addresses, the page geometry the server enforces, the region size
//! the client negotiates, optional store persistence, and logging options.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variables via `from_env()` (`NETMEM_*`)
//! - Direct instantiation with defaults plus `default_with_overrides()`
//!
//! The protocol itself carries no timeouts, so there are none to configure:
//! a hung peer blocks its caller, and the session is torn down by closing the
//! connection.

use crate::error::{NetmemError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Default port, shared by server and client.
pub const DEFAULT_PORT: u16 = 6502;

/// Default page size enforced by the server (bytes).
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Default region size a client negotiates (bytes): 16 pages.
pub const DEFAULT_REGION_SIZE: u64 = 64 * 1024;

/// Largest backing store the server will allocate for one session (bytes).
pub const MAX_MEMORY_SIZE: u64 = 256 * 1024 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetmemConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetmemConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NetmemError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| NetmemError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("NETMEM_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(addr) = std::env::var("NETMEM_CLIENT_ADDRESS") {
            config.client.address = addr;
        }

        if let Ok(page_size) = std::env::var("NETMEM_PAGE_SIZE") {
            if let Ok(val) = page_size.parse::<u64>() {
                config.server.page_size = val;
            }
        }

        if let Ok(memory) = std::env::var("NETMEM_MEMORY_SIZE") {
            if let Ok(val) = memory.parse::<u64>() {
                config.client.memory_size = val;
            }
        }

        if let Ok(path) = std::env::var("NETMEM_PERSIST_PATH") {
            config.server.persist_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.client.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(NetmemError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:6502")
    pub address: String,

    /// Page size every client must negotiate (bytes)
    pub page_size: u64,

    /// Largest memory size a connect handshake may request (bytes)
    pub max_memory_size: u64,

    /// Flat file the backing store is written to on every accepted sync
    pub persist_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            page_size: DEFAULT_PAGE_SIZE,
            max_memory_size: MAX_MEMORY_SIZE,
            persist_path: None,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Validate address format
        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:6502')",
                self.address
            ));
        }

        // Validate page geometry
        if self.page_size == 0 || !self.page_size.is_power_of_two() {
            errors.push(format!(
                "Page size must be a nonzero power of two, got {}",
                self.page_size
            ));
        } else if self.page_size > 1024 * 1024 {
            errors.push(format!(
                "Page size too large: {} bytes (maximum: 1 MiB)",
                self.page_size
            ));
        }

        if self.max_memory_size == 0 {
            errors.push("Max memory size must be greater than 0".to_string());
        } else if self.page_size > 0 && self.max_memory_size % self.page_size != 0 {
            errors.push(format!(
                "Max memory size {} is not a multiple of the page size {}",
                self.max_memory_size, self.page_size
            ));
        } else if self.max_memory_size > MAX_MEMORY_SIZE {
            errors.push(format!(
                "Max memory size very large: {} bytes (every sync rewrites the whole store when persistence is on)",
                self.max_memory_size
            ));
        }

        // Validate persistence target
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    errors.push(format!(
                        "Persist file directory does not exist: {}",
                        parent.display()
                    ));
                }
            }
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server address (e.g., "127.0.0.1:6502" or "pager.local:6502")
    pub address: String,

    /// Region size to negotiate (bytes); must be a multiple of the host
    /// page size
    pub memory_size: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            memory_size: DEFAULT_REGION_SIZE,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Hostnames are allowed here, so only the port suffix is checked
        match self.address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                if port.parse::<u16>().is_err() {
                    errors.push(format!(
                        "Invalid port in client address: '{}'",
                        self.address
                    ));
                }
            }
            _ => errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'host:port')",
                self.address
            )),
        }

        if self.memory_size == 0 {
            errors.push("Region size must be greater than 0".to_string());
        } else if self.memory_size > MAX_MEMORY_SIZE {
            errors.push(format!(
                "Region size very large: {} bytes (servers cap sessions at {} bytes by default)",
                self.memory_size, MAX_MEMORY_SIZE
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
