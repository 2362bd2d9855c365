//! Configuration file discovery and parsing
//!
//! ```ron
//! (
//!     helo: "client.example.com",
//!     sender: "bounces@example.com",
//!     delivery: (
//!         port: 25,
//!         mx_override: Some("localhost:1025"),
//!         timeouts: (connect_secs: 30, reply_secs: 10, data_secs: 120),
//!     ),
//! )
//! ```

use std::{
    io,
    path::{Path, PathBuf},
};

use mxsend_delivery::{DEFAULT_HELO, DEFAULT_SENDER, DeliveryConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MXSEND_CONFIG";

/// Locations searched when neither a flag nor the environment names a file.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] =
    ["./mxsend.config.ron", "/etc/mxsend/mxsend.config.ron"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config from {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: Box<ron::error::SpannedError>,
    },

    #[error("MXSEND_CONFIG points to non-existent file: {}", .0.display())]
    MissingFromEnv(PathBuf),

    #[error("Config file does not exist: {}", .0.display())]
    Missing(PathBuf),
}

/// Everything `mxsend` reads from its configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identity announced with HELO
    #[serde(default = "default_helo")]
    pub helo: String,

    /// Envelope sender when `--from` is not given
    #[serde(default = "default_sender")]
    pub sender: String,

    #[serde(default)]
    pub delivery: DeliveryConfig,
}

fn default_helo() -> String {
    DEFAULT_HELO.to_string()
}

fn default_sender() -> String {
    DEFAULT_SENDER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            helo: default_helo(),
            sender: default_sender(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Config {
    /// Parse RON text; `path` is only used for error messages.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the text is not a valid configuration.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content, path)
    }

    /// Load the configuration found by [`find_config_file`], or the defaults
    /// when there is none. Returns the path that was used, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file is missing, or a file cannot be
    /// read or parsed.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match find_config_file(explicit)? {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }
}

/// Find the configuration file using the following precedence:
/// 1. An explicitly given path (`--config`)
/// 2. `MXSEND_CONFIG` environment variable
/// 3. ./mxsend.config.ron (current working directory)
/// 4. /etc/mxsend/mxsend.config.ron (system-wide config)
///
/// No file at all is not an error; a file named by 1 or 2 that does not
/// exist is.
///
/// # Errors
///
/// Returns an error when an explicitly named file does not exist.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let defaults = DEFAULT_CONFIG_PATHS.map(PathBuf::from);

    search(explicit, from_env, &defaults)
}

fn search(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    defaults: &[PathBuf],
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(ConfigError::Missing(path.to_path_buf()));
    }

    if let Some(path) = from_env {
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::MissingFromEnv(path));
    }

    Ok(defaults.iter().find(|path| path.exists()).cloned())
}
