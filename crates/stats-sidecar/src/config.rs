//! Configuration loading and validation for the stats sidecar.
//!
//! Two sources are resolved once at startup:
//! - [`Identity`]: who we are, what we poll and where we publish. Read from
//!   the environment; every value is required.
//! - [`Config`]: tunables from an optional YAML file. Defaults apply when no
//!   file exists.

use crate::signer::SharedKey;
use common::logging::{FileSink, LogSettings};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Prefix tried before the bare variable name
pub const ENV_PREFIX: &str = "SIDECAR_";

/// Environment variable pointing at an explicit settings file
pub const CONFIG_PATH_VAR: &str = "SIDECAR_CONFIG";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("Environment variable {0} is empty")]
    EmptyVar(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Shared key is not valid base64: {0}")]
    InvalidSharedKey(base64::DecodeError),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ConfigError {
    /// Create a new invalid value error.
    pub fn invalid(field: &'static str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        }
    }
}

impl From<ConfigError> for common::Error {
    fn from(err: ConfigError) -> Self {
        common::Error::config(err)
    }
}

/// Static identity of this sidecar.
///
/// Immutable after startup and passed by reference into every stage.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Instance identifier reported as `PodName`
    pub pod_name: String,

    /// Game server host
    pub host: String,

    /// Game server port
    pub port: u16,

    /// Ingestion workspace (tenant) id
    pub customer_id: String,

    /// Decoded ingestion shared key
    pub shared_key: SharedKey,
}

impl Identity {
    /// Resolve the identity from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the identity through `lookup`.
    ///
    /// Each variable is looked up as `SIDECAR_<NAME>` first, then `<NAME>`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(&format!("{}{}", ENV_PREFIX, name))
                .or_else(|| lookup(name))
                .ok_or(ConfigError::MissingVar(name))?;
            let value = value.trim();
            if value.is_empty() {
                return Err(ConfigError::EmptyVar(name));
            }
            Ok(value.to_string())
        };

        let pod_name = require("POD_NAME")?;
        let host = require("HOST")?;
        let port = match require("PORT")?.parse::<u16>() {
            Ok(0) => return Err(ConfigError::invalid("PORT", "port must be non-zero")),
            Ok(port) => port,
            Err(e) => return Err(ConfigError::invalid("PORT", e)),
        };
        let customer_id = require("AZURE_CUSTOMER_ID")?;
        let shared_key = SharedKey::from_base64(&require("AZURE_SHARED_KEY")?)?;

        Ok(Self {
            pod_name,
            host,
            port,
            customer_id,
            shared_key,
        })
    }

    /// `host:port` of the polled server
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleSettings,

    #[serde(default)]
    pub ingestion: IngestionSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// File the settings were read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.schedule.validate()?;
        self.ingestion.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Polling cadence
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Period between two pipeline passes
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_interval")]
    pub interval: Duration,

    /// Period of the idle "waiting" heartbeat log
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_heartbeat")]
    pub heartbeat: Duration,
}

/// Ingestion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Host suffix; the tenant id is prepended as a subdomain
    pub host: String,

    /// `Log-Type` header, names the custom log table
    pub log_type: String,

    /// `api-version` query parameter
    pub api_version: String,

    /// Base URL replacing `https://{tenant}.{host}`
    pub endpoint: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
    /// Rotating file sink; `null` disables it
    pub file: Option<FileSink>,
}

// Default implementations

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            heartbeat: Duration::from_secs(60),
        }
    }
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            host: "ods.opinsights.azure.com".to_string(),
            log_type: "MinecraftStats".to_string(),
            api_version: "2016-04-01".to_string(),
            endpoint: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: None,
            format: None,
            file: Some(FileSink::default()),
        }
    }
}

impl Validate for IngestionSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.host.trim().is_empty() {
            errors.add("host", ValidationError::new("host_empty"));
        }
        if let Err(e) = validate_log_type(&self.log_type) {
            errors.add("log_type", e);
        }
        if self.api_version.trim().is_empty() {
            errors.add("api_version", ValidationError::new("api_version_empty"));
        }
        if let Some(endpoint) = &self.endpoint {
            if let Err(e) = validate_endpoint(endpoint) {
                errors.add("endpoint", e);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl Validate for LoggingSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(format) = self.format.as_deref() {
            if format != "text" && format != "json" {
                errors.add("format", ValidationError::new("log_format_unknown"));
            }
        }
        if let Some(file) = &self.file {
            let name = file.file_name.trim();
            if name.is_empty() || name.contains(['/', '\\']) {
                errors.add("file", ValidationError::new("log_file_name_invalid"));
            }
            if !(1..=10_240).contains(&file.max_size_mb) {
                errors.add("file", ValidationError::new("max_size_out_of_range"));
            }
            if file.max_backups > 100 {
                errors.add("file", ValidationError::new("max_backups_out_of_range"));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// Custom validators

fn validate_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if !(100..=3_600_000).contains(&millis) {
        return Err(ValidationError::new("interval_out_of_range"));
    }
    Ok(())
}

fn validate_heartbeat(heartbeat: &Duration) -> Result<(), ValidationError> {
    let secs = heartbeat.as_secs();
    if !(1..=3_600).contains(&secs) {
        return Err(ValidationError::new("heartbeat_out_of_range"));
    }
    Ok(())
}

// Custom log names: letters, digits and underscore, at most 100 characters
fn validate_log_type(log_type: &str) -> Result<(), ValidationError> {
    if log_type.is_empty() || log_type.len() > 100 {
        return Err(ValidationError::new("log_type_length"));
    }
    if !log_type.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::new("log_type_invalid_chars"));
    }
    Ok(())
}

fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    let trimmed = endpoint.trim();
    if !trimmed.starts_with("https://") && !trimmed.starts_with("http://") {
        return Err(ValidationError::new("endpoint_invalid_scheme"));
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load settings from the default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        config.source = Some(path.as_ref().to_path_buf());
        Ok(config)
    }

    /// Find the settings file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(explicit) = std::env::var(CONFIG_PATH_VAR) {
            paths.push(PathBuf::from(explicit));
        }

        paths.push(PathBuf::from("/etc/stats-sidecar/sidecar.yaml"));

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./sidecar.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/stats-sidecar/sidecar.yaml"))
    }

    /// Convert to the subscriber settings used by `common::logging`
    pub fn to_log_settings(&self) -> LogSettings {
        LogSettings {
            level: self
                .logging
                .level
                .clone()
                .unwrap_or_else(|| "info".to_string()),
            json: self.logging.format.as_deref() == Some("json"),
            file: self.logging.file.clone(),
        }
    }
}
