//! Configuration Management
//!
//! Connection parameters for the management server, the zone selector of a
//! run, and the persisted defaults file (`config.json` in the user's config
//! directory) that fills in anything not given on the command line.

use crate::definition::DatabaseConfig;
use crate::error::BackupError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_HOST: &str = "127.0.0.1:8080";
pub const DEFAULT_PATH: &str = "/client/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_DB_SERVER: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 3306;

/// How to reach and authenticate against the management server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub key: String,
    pub secret: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            secret: String::new(),
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ConnectionConfig {
    /// Collect every problem with the connection settings
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.key.is_empty() {
            problems.push("key cannot be empty".to_string());
        }
        if self.secret.is_empty() {
            problems.push("secret cannot be empty".to_string());
        }
        if self.scheme != "http" && self.scheme != "https" {
            problems.push("scheme must be \"http\" or \"https\"".to_string());
        }
        if self.host.is_empty() {
            problems.push("host cannot be empty".to_string());
        }
        if self.path.is_empty() {
            problems.push("path cannot be empty".to_string());
        }
        problems
    }

    /// Lowercase the scheme so `HTTPS` is accepted
    pub fn normalized(mut self) -> Self {
        self.scheme = self.scheme.to_lowercase();
        self
    }
}

/// Which zone to back up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneSelector {
    Id(String),
    Name(String),
}

impl std::fmt::Display for ZoneSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

impl ZoneSelector {
    /// Build a selector from the two mutually exclusive options
    pub fn from_options(
        zone_id: Option<&str>,
        zone_name: Option<&str>,
    ) -> Result<Self, BackupError> {
        let zone_id = zone_id.filter(|s| !s.is_empty());
        let zone_name = zone_name.filter(|s| !s.is_empty());

        match (zone_id, zone_name) {
            (Some(_), Some(_)) => Err(BackupError::Config(
                "zone-id and zone-name cannot be set at once".to_string(),
            )),
            (Some(id), None) => Ok(Self::Id(id.to_string())),
            (None, Some(name)) => Ok(Self::Name(name.to_string())),
            (None, None) => Err(BackupError::Config(
                "zone-id or zone-name must be set".to_string(),
            )),
        }
    }
}

/// Which domain to back up
///
/// Accepted for forward compatibility; the fetch pipeline does not use it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DomainSelector {
    #[default]
    All,
    Id(String),
    Name(String),
}

impl DomainSelector {
    pub fn from_options(
        domain_id: Option<&str>,
        domain_name: Option<&str>,
    ) -> Result<Self, BackupError> {
        match (
            domain_id.filter(|s| !s.is_empty()),
            domain_name.filter(|s| !s.is_empty()),
        ) {
            (Some(_), Some(_)) => Err(BackupError::Config(
                "domain-id and domain-name cannot be set at once".to_string(),
            )),
            (Some(id), None) => Ok(Self::Id(id.to_string())),
            (None, Some(name)) => Ok(Self::Name(name.to_string())),
            (None, None) => Ok(Self::All),
        }
    }
}

/// Everything the orchestrator needs to build one definition
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub connection: ConnectionConfig,
    pub zone_id: Option<String>,
    pub zone_name: Option<String>,
    pub database: Option<DatabaseConfig>,
}

impl BuildConfig {
    /// Validate credentials and the zone selector
    pub fn validate(&self) -> Result<ZoneSelector, BackupError> {
        let problems = self.connection.problems();
        if !problems.is_empty() {
            return Err(BackupError::Config(problems.join("; ")));
        }
        ZoneSelector::from_options(self.zone_id.as_deref(), self.zone_name.as_deref())
    }
}

/// Persisted defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cs-zone-cloner").join("config.json"))
    }

    /// Load settings from disk; a missing or unreadable file yields defaults
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring settings file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolve a connection: explicit value > settings file > built-in default
    pub fn connection(
        &self,
        key: Option<String>,
        secret: Option<String>,
        scheme: Option<String>,
        host: Option<String>,
        path: Option<String>,
    ) -> ConnectionConfig {
        let defaults = ConnectionConfig::default();
        ConnectionConfig {
            key: key.or_else(|| self.key.clone()).unwrap_or(defaults.key),
            secret: secret
                .or_else(|| self.secret.clone())
                .unwrap_or(defaults.secret),
            scheme: scheme
                .or_else(|| self.scheme.clone())
                .unwrap_or(defaults.scheme),
            host: host.or_else(|| self.host.clone()).unwrap_or(defaults.host),
            path: path.or_else(|| self.path.clone()).unwrap_or(defaults.path),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
        .normalized()
    }
}
