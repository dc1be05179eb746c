//! Daemon configuration and endpoint table.
//!
//! Configuration is loaded from `~/.config/toolgate/config.toml` unless a path
//! is given on the command line.
//!
//! ## Example Configuration
//!
//! ```toml
//! bind_address = "127.0.0.1:8787"
//!
//! [[endpoints]]
//! id = "tool-clock"
//! tool = "get_current_time"
//!
//! [[endpoints]]
//! id = "tool-echo"
//! tool = "echo"
//!
//! [settings]
//! freshness_window_secs = 300
//! generate_secret = true
//! # secret_file = "/var/lib/toolgate/application_secret"
//! ```

use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};
use crate::paths;
use crate::server::builtin_tool;

/// Daemon configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address the HTTP server listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Hosted tool endpoints
    pub endpoints: Vec<EndpointConfig>,

    /// Optional daemon settings
    #[serde(default)]
    pub settings: Settings,
}

/// One hosted endpoint: the identifier callers sign for, and the tool behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Endpoint identifier, also the last path segment of `/tools/<id>`
    pub id: String,

    /// Name of the built-in tool that handles verified calls
    pub tool: String,
}

/// Optional daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Accepted distance between a request timestamp and the local clock (default: 300)
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,

    /// Generate and persist an application secret when none exists (default: true)
    #[serde(default = "default_generate_secret")]
    pub generate_secret: bool,

    /// Where the application secret lives (default: `$XDG_DATA_HOME/toolgate/application_secret`)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window(),
            generate_secret: default_generate_secret(),
            secret_file: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8787".to_string()
}

const fn default_freshness_window() -> u64 {
    toolgate_auth::DEFAULT_FRESHNESS_WINDOW_SECS
}

const fn default_generate_secret() -> bool {
    true
}

impl DaemonConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined
    /// - The file doesn't exist
    /// - Deserialization or validation fails
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            return Err(DaemonError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| DaemonError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = paths::config_dir()
            .ok_or_else(|| DaemonError::Config("Failed to determine config directory".to_string()))?
            .join("toolgate");

        Ok(config_dir.join("config.toml"))
    }

    /// Returns where the application secret is read from and written to.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the data directory cannot
    /// be determined.
    pub fn secret_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.settings.secret_file {
            return Ok(path.clone());
        }

        Ok(paths::data_dir()
            .ok_or_else(|| DaemonError::Config("Failed to determine data directory".to_string()))?
            .join("toolgate")
            .join("application_secret"))
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not `host:port`.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            DaemonError::Config(format!("Invalid bind_address '{}': {e}", self.bind_address))
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoints are defined
    /// - An endpoint id is empty or contains `/`
    /// - Duplicate endpoint ids are found
    /// - An endpoint names an unknown tool
    /// - The bind address or freshness window is invalid
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(DaemonError::Config(
                "No endpoints defined in configuration".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.id.trim().is_empty() || endpoint.id.contains('/') {
                return Err(DaemonError::Config(format!(
                    "Invalid endpoint id '{}'",
                    endpoint.id
                )));
            }

            if !seen.insert(endpoint.id.as_str()) {
                return Err(DaemonError::Config(format!(
                    "Duplicate endpoint id '{}'",
                    endpoint.id
                )));
            }

            if builtin_tool(&endpoint.tool).is_none() {
                return Err(DaemonError::Config(format!(
                    "Endpoint '{}' uses unknown tool '{}'",
                    endpoint.id, endpoint.tool
                )));
            }
        }

        if self.settings.freshness_window_secs == 0 {
            return Err(DaemonError::Config(
                "freshness_window_secs must be greater than zero".to_string(),
            ));
        }

        self.socket_addr()?;

        Ok(())
    }
}
