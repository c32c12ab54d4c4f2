//! Configuration management for bbmcp.
//!
//! Non-secret settings (server URL, username) may live in a TOML file stored
//! in the platform config directory:
//!
//! - **macOS/Linux**: `~/.config/bbmcp/config.toml`
//! - **Windows**: `%APPDATA%\bbmcp\config.toml`
//!
//! Secrets are only ever read from the environment. Environment variables
//! also override the file, so a bare `BITBUCKET_*` environment is enough to
//! start the server.
//!
//! # Example
//!
//! ```ignore
//! use bbmcp_core::config::{Config, RemoteCredential};
//!
//! let config = Config::load()?;
//! let credential = RemoteCredential::from_env(&config)?;
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "bbmcp";

/// Environment variable holding the server base URL.
pub const ENV_BASE_URL: &str = "BITBUCKET_BASE_URL";
/// Environment variable holding the username for basic authentication.
pub const ENV_USERNAME: &str = "BITBUCKET_USERNAME";
/// Environment variable holding the password or app password.
pub const ENV_PASSWORD: &str = "BITBUCKET_PASSWORD";
/// Environment variable holding a personal access token (bearer auth).
pub const ENV_TOKEN: &str = "BITBUCKET_TOKEN";

// =============================================================================
// Configuration file
// =============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Bitbucket Server configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitbucket: Option<BitbucketConfig>,
}

/// Bitbucket Server connection settings (no secrets).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BitbucketConfig {
    /// Server base URL, e.g. `https://bitbucket.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Username for basic authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `bitbucket.field` (e.g., `bitbucket.url`, `bitbucket.username`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let field = parse_key(key)?;
        let config = self.bitbucket.get_or_insert_with(BitbucketConfig::default);

        match field {
            "url" | "base_url" => config.url = Some(value.trim_end_matches('/').to_string()),
            "username" | "user" => config.username = Some(value.to_string()),
            _ => return Err(unknown_field(field)),
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let field = parse_key(key)?;
        let Some(config) = &self.bitbucket else {
            return Ok(None);
        };

        match field {
            "url" | "base_url" => Ok(config.url.clone()),
            "username" | "user" => Ok(config.username.clone()),
            _ => Err(unknown_field(field)),
        }
    }
}

fn parse_key(key: &str) -> Result<&str> {
    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        ["bitbucket", field] => Ok(*field),
        [provider, _] => Err(Error::Config(format!("Unknown provider: {}", provider))),
        _ => Err(Error::Config(format!(
            "Invalid config key '{}'. Expected format: bitbucket.field",
            key
        ))),
    }
}

fn unknown_field(field: &str) -> Error {
    Error::Config(format!(
        "Secrets are read from the environment only; unknown Bitbucket config field: {}",
        field
    ))
}

// =============================================================================
// Credentials
// =============================================================================

/// How requests authenticate against the server.
#[derive(Clone, PartialEq)]
pub enum Auth {
    /// HTTP basic authentication with a password or app password
    Basic { username: String, password: String },
    /// Personal access token sent as a bearer token
    Bearer { token: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Server location plus credentials, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCredential {
    /// Base URL without trailing slash
    pub base_url: String,
    pub auth: Auth,
}

impl RemoteCredential {
    /// Resolve credentials from the process environment, falling back to
    /// `config` for non-secret values.
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve credentials using `lookup` for environment variables.
    ///
    /// A token wins over username/password. Empty values count as unset.
    pub fn resolve<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let file = config.bitbucket.clone().unwrap_or_default();

        let base_url = var(ENV_BASE_URL).or(file.url).ok_or_else(|| {
            Error::Config(format!(
                "Missing required environment variable: {} (or bitbucket.url in the config file)",
                ENV_BASE_URL
            ))
        })?;
        let base_url = base_url.trim_end_matches('/').to_string();

        if let Some(token) = var(ENV_TOKEN) {
            debug!(base_url = base_url.as_str(), "Using bearer token authentication");
            return Ok(Self {
                base_url,
                auth: Auth::Bearer { token },
            });
        }

        let username = var(ENV_USERNAME).or(file.username);
        let password = var(ENV_PASSWORD);

        match (username, password) {
            (Some(username), Some(password)) => {
                debug!(
                    base_url = base_url.as_str(),
                    username = username.as_str(),
                    "Using basic authentication"
                );
                Ok(Self {
                    base_url,
                    auth: Auth::Basic { username, password },
                })
            }
            _ => Err(Error::Config(format!(
                "Missing credentials: set {} or both {} and {}",
                ENV_TOKEN, ENV_USERNAME, ENV_PASSWORD
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
