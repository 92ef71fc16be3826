//! Configuration management for ahti-connect.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named database connections and probe settings.

use crate::error::{AhtiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Sync URL used when nothing else is configured.
pub const DEFAULT_SYNC_URL: &str = "http://localhost:8082";

/// Local replica file used when nothing else is configured.
pub const DEFAULT_LOCAL_PATH: &str = "local.db";

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "libsql", "ws", "wss"];

/// Main configuration structure for ahti-connect.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,

    /// Probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// How the client reaches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Local replica file kept in sync with the remote primary.
    #[default]
    Replica,
    /// Every statement goes over the network to the server.
    Remote,
    /// Plain local database file, no network.
    Local,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replica => "replica",
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }

    /// Whether this mode talks to a sync server.
    pub fn needs_url(&self) -> bool {
        matches!(self, Self::Replica | Self::Remote)
    }

    /// Whether this mode keeps a database file on disk.
    pub fn needs_local_path(&self) -> bool {
        matches!(self, Self::Replica | Self::Local)
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replica" | "embedded-replica" => Ok(Self::Replica),
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            _ => Err(format!(
                "Invalid connection mode: {s}. Expected: replica, remote, or local"
            )),
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConnectionConfig {
    /// Connection mode (defaults to replica).
    pub mode: Option<ConnectionMode>,

    /// URL of the sync server (libsql-server / sqld).
    pub sync_url: Option<String>,

    /// JWT auth token (not recommended to store in config).
    pub auth_token: Option<String>,

    /// Local database or replica file.
    pub local_path: Option<PathBuf>,

    /// Whether reads on the replica observe the replica's own writes.
    pub read_your_writes: Option<bool>,

    /// Background sync period for the replica, in seconds.
    pub sync_interval_secs: Option<u64>,
}

impl ConnectionConfig {
    /// Creates a replica connection config from a sync URL.
    pub fn from_url(url: &str) -> Result<Self> {
        validate_sync_url(url)?;
        Ok(Self {
            sync_url: Some(url.to_string()),
            ..Default::default()
        })
    }

    /// Creates a config for a plain local database file.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: Some(ConnectionMode::Local),
            local_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Returns the connection mode, defaulting to replica.
    pub fn effective_mode(&self) -> ConnectionMode {
        self.mode.unwrap_or_default()
    }

    /// Returns the local file path, defaulting to `local.db`.
    pub fn effective_local_path(&self) -> PathBuf {
        self.local_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_PATH))
    }

    /// Returns the auth token, or an empty string for auth-less servers.
    pub fn effective_auth_token(&self) -> String {
        self.auth_token.clone().unwrap_or_default()
    }

    pub fn effective_read_your_writes(&self) -> bool {
        self.read_your_writes.unwrap_or(true)
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &ConnectionConfig) {
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.sync_url.is_some() {
            self.sync_url = other.sync_url.clone();
        }
        if other.auth_token.is_some() {
            self.auth_token = other.auth_token.clone();
        }
        if other.local_path.is_some() {
            self.local_path = other.local_path.clone();
        }
        if other.read_your_writes.is_some() {
            self.read_your_writes = other.read_your_writes;
        }
        if other.sync_interval_secs.is_some() {
            self.sync_interval_secs = other.sync_interval_secs;
        }
    }

    /// Applies environment variables (LIBSQL_URL, etc.) as defaults.
    pub fn apply_env_defaults(&mut self) {
        self.apply_env_defaults_from(|key| std::env::var(key).ok());
    }

    /// Applies defaults from an arbitrary variable lookup.
    pub fn apply_env_defaults_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.sync_url.is_none() {
            self.sync_url = lookup("LIBSQL_URL");
        }
        if self.auth_token.is_none() {
            self.auth_token = lookup("LIBSQL_AUTH_TOKEN");
        }
        if self.local_path.is_none() {
            self.local_path = lookup("LIBSQL_LOCAL_PATH").map(PathBuf::from);
        }
    }

    /// Checks that the fields required by the connection mode are present.
    pub fn validate(&self) -> Result<()> {
        let mode = self.effective_mode();

        if mode.needs_url() {
            let url = self.sync_url.as_deref().ok_or_else(|| {
                AhtiError::config(format!("A sync URL is required in {mode} mode"))
            })?;
            validate_sync_url(url)?;
        }

        if mode.needs_local_path() && self.effective_local_path().as_os_str().is_empty() {
            return Err(AhtiError::config(format!(
                "A local database path is required in {mode} mode"
            )));
        }

        Ok(())
    }

    /// Returns a display-safe string (no token) for logs and output.
    pub fn display_string(&self) -> String {
        let mode = self.effective_mode();
        let url = self.sync_url.as_deref().unwrap_or("<unset>");
        let auth = if self.auth_token.as_deref().is_some_and(|t| !t.is_empty()) {
            "token"
        } else {
            "no auth"
        };

        match mode {
            ConnectionMode::Replica => format!(
                "{} <- {url} ({mode}, {auth})",
                self.effective_local_path().display()
            ),
            ConnectionMode::Remote => format!("{url} ({mode}, {auth})"),
            ConnectionMode::Local => {
                format!("{} ({mode})", self.effective_local_path().display())
            }
        }
    }
}

/// Validates a sync URL and its scheme.
pub fn validate_sync_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| AhtiError::config(format!("Invalid sync URL '{url}': {e}")))?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(AhtiError::config(format!(
            "Invalid scheme '{}'. Expected one of: {}",
            parsed.scheme(),
            ALLOWED_SCHEMES.join(", ")
        )));
    }

    if parsed.host_str().is_none() {
        return Err(AhtiError::config(format!("Sync URL '{url}' has no host")));
    }

    Ok(parsed)
}

/// Settings for the connection probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// Table created and queried by the probe.
    #[serde(default = "default_table")]
    pub table: String,

    /// Value inserted on each probe run.
    #[serde(default = "default_value")]
    pub value: i64,
}

fn default_table() -> String {
    "users".to_string()
}

fn default_value() -> i64 {
    1
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            value: default_value(),
        }
    }
}

impl ProbeConfig {
    /// Ensures the table name is a plain SQL identifier.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)
    }

    /// Overlays the set CLI values and validates the result.
    pub fn with_overrides(&self, table: Option<&str>, value: Option<i64>) -> Result<Self> {
        let merged = Self {
            table: table.map_or_else(|| self.table.clone(), str::to_string),
            value: value.unwrap_or(self.value),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AhtiError::config(format!(
            "Invalid table name '{name}'. Use letters, digits and underscores"
        )))
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ahti-connect")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AhtiError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            AhtiError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }
}
