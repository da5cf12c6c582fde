//! Configuration for the monitoring server
//!
//! Loaded from a TOML file. Every key has a default except the email
//! credentials: alerting is only started when the `[email]` section and at
//! least one recipient are present.
//!
//! # Example
//! ```ignore
//! let config = Config::load("config.toml")?;
//! let window = config.reporting.datapoints_interval;
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Missing required key: {0}")]
    MissingKey(&'static str),
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    /// SMTP settings; absent disables alert delivery.
    pub email: Option<EmailConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The settings the alerting task needs, validated.
    ///
    /// Errors when recipients are configured without an `[email]` section
    /// or vice versa; the periodic task must not start half-configured.
    pub fn alerting(&self) -> Result<(&EmailConfig, &[String]), ConfigError> {
        let email = self
            .email
            .as_ref()
            .ok_or(ConfigError::MissingKey("email"))?;
        if self.reporting.recipients.is_empty() {
            return Err(ConfigError::MissingKey("reporting.recipients"));
        }
        Ok((email, &self.reporting.recipients))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the collector (e.g., "0.0.0.0:8080")
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// MongoDB connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// MongoDB URI
    #[serde(default = "default_db_uri")]
    pub uri: String,

    /// Database name
    #[serde(default = "default_db_name")]
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: default_db_uri(),
            database: default_db_name(),
        }
    }
}

fn default_db_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_db_name() -> String {
    "monitoring".to_string()
}

/// Reporting pass configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    /// Classifier period in seconds
    #[serde(default = "default_report_interval")]
    pub interval: u64,

    /// Datapoint window considered per client, in seconds
    #[serde(default = "default_datapoints_interval")]
    pub datapoints_interval: u64,

    /// Alert recipients
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval: default_report_interval(),
            datapoints_interval: default_datapoints_interval(),
            recipients: Vec::new(),
        }
    }
}

fn default_report_interval() -> u64 {
    300
}

fn default_datapoints_interval() -> u64 {
    1200
}

/// SMTP delivery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Use TLS
    #[serde(default)]
    pub secure: bool,

    pub username: String,
    pub password: String,
}

fn default_smtp_port() -> u16 {
    25
}
