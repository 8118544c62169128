/*!
 * Configuration types for snowprobe
 */

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProbeError, Result};

/// Connection parameters for one run. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Instance base URL, e.g. `https://dev12345.service-now.com`
    pub instance: String,
    /// API principal
    pub username: String,
    /// API secret
    pub password: SecretString,
    /// Target application table, e.g. `incident`
    pub application: String,
}

/// Main configuration, loadable from TOML and overridden by CLI flags
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Instance base URL
    #[serde(default)]
    pub instance: Option<String>,

    /// API username
    #[serde(default)]
    pub username: Option<String>,

    /// API password
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Application table name
    #[serde(default)]
    pub application: Option<String>,

    /// Request timeout in seconds (0 = wait forever)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            instance: None,
            username: None,
            password: None,
            application: None,
            timeout_secs: default_timeout_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Log sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file path (None = stderr)
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    /// Rotate once the active file would exceed this size (0 = never)
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Number of rotated files kept next to the active one (0 = never rotate)
    #[serde(default = "default_backups")]
    pub backups: usize,

    /// Shorthand for level = debug
    #[serde(default)]
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: LogLevel::default(),
            format: LogFormat::default(),
            max_bytes: default_max_bytes(),
            backups: default_backups(),
            verbose: false,
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Line format of the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("snowprobe.log"))
}

fn default_max_bytes() -> u64 {
    100_000_000
}

fn default_backups() -> usize {
    2
}

impl ProbeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            ProbeError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Request timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Resolve the connection parameters, failing on the first missing value
    pub fn connection_params(&self) -> Result<ConnectionParams> {
        Ok(ConnectionParams {
            instance: required(&self.instance, "instance URL (--instance)")?,
            username: required(&self.username, "username (--username)")?,
            password: self
                .password
                .clone()
                .ok_or_else(|| ProbeError::Config("password (--password) is required".into()))?,
            application: required(&self.application, "application table (--application)")?,
        })
    }
}

fn required(value: &Option<String>, what: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ProbeError::Config(format!("{} is required", what))),
    }
}
