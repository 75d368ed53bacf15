use crate::error::{GeoshiftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a setting came from. Later layers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    Default,
    /// TOML file named by `GEOSHIFT_CONFIG`
    File,
    /// `GEOSHIFT_*` variables
    Environment,
}

impl ConfigSource {
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
        }
    }
}

/// A setting plus the layer it was taken from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has at least the current precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() >= self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Default delay between delivering an archive and purging its request
pub const DEFAULT_REAPER_DELAY_SECS: u64 = 20;

/// Default lifetime of an upload that is never delivered
pub const DEFAULT_RETENTION_SECS: u64 = 3600;

/// Default request body limit in megabytes
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

/// Layered configuration for the processing service
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub storage_root: ConfigValue<PathBuf>,
    pub reaper_delay_secs: ConfigValue<u64>,
    pub retention_secs: ConfigValue<u64>,
    pub max_upload_mb: ConfigValue<u64>,
}

impl LayeredConfig {
    pub fn with_defaults() -> Self {
        Self {
            storage_root: ConfigValue::new(
                env::temp_dir().join("geoshift"),
                ConfigSource::Default,
            ),
            reaper_delay_secs: ConfigValue::new(DEFAULT_REAPER_DELAY_SECS, ConfigSource::Default),
            retention_secs: ConfigValue::new(DEFAULT_RETENTION_SECS, ConfigSource::Default),
            max_upload_mb: ConfigValue::new(DEFAULT_MAX_UPLOAD_MB, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| GeoshiftError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| GeoshiftError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(root) = file_config.storage_root {
            self.storage_root.update(root, ConfigSource::File);
        }

        if let Some(delay) = file_config.reaper_delay_secs {
            self.reaper_delay_secs.update(delay, ConfigSource::File);
        }

        if let Some(retention) = file_config.retention_secs {
            self.retention_secs.update(retention, ConfigSource::File);
        }

        if let Some(max) = file_config.max_upload_mb {
            self.max_upload_mb.update(check_max_upload(max)?, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // GEOSHIFT_STORAGE_ROOT
        if let Ok(root) = env::var("GEOSHIFT_STORAGE_ROOT") {
            if root.trim().is_empty() {
                tracing::warn!("Ignoring empty GEOSHIFT_STORAGE_ROOT");
            } else {
                self.storage_root.update(PathBuf::from(root), ConfigSource::Environment);
            }
        }

        // GEOSHIFT_REAPER_DELAY_SECS
        if let Ok(delay_str) = env::var("GEOSHIFT_REAPER_DELAY_SECS") {
            match delay_str.parse::<u64>() {
                Ok(delay) => self.reaper_delay_secs.update(delay, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOSHIFT_REAPER_DELAY_SECS value '{}': expected seconds",
                    delay_str
                ),
            }
        }

        // GEOSHIFT_RETENTION_SECS
        if let Ok(retention_str) = env::var("GEOSHIFT_RETENTION_SECS") {
            match retention_str.parse::<u64>() {
                Ok(retention) => self.retention_secs.update(retention, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOSHIFT_RETENTION_SECS value '{}': expected seconds",
                    retention_str
                ),
            }
        }

        // GEOSHIFT_MAX_UPLOAD_MB
        if let Ok(max_str) = env::var("GEOSHIFT_MAX_UPLOAD_MB") {
            match parse_max_upload(&max_str) {
                Ok(max) => self.max_upload_mb.update(max, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOSHIFT_MAX_UPLOAD_MB value '{}': expected a positive integer",
                    max_str
                ),
            }
        }

        self
    }

    /// `key -> (value, source)`, logged at start-up
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "storage_root".to_string(),
            (self.storage_root.value.display().to_string(), self.storage_root.source),
        );
        map.insert(
            "reaper_delay_secs".to_string(),
            (self.reaper_delay_secs.value.to_string(), self.reaper_delay_secs.source),
        );
        map.insert(
            "retention_secs".to_string(),
            (self.retention_secs.value.to_string(), self.retention_secs.source),
        );
        map.insert(
            "max_upload_mb".to_string(),
            (self.max_upload_mb.value.to_string(), self.max_upload_mb.source),
        );

        map
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    storage_root: Option<PathBuf>,
    reaper_delay_secs: Option<u64>,
    retention_secs: Option<u64>,
    max_upload_mb: Option<u64>,
}

/// Parse an upload limit in megabytes; zero is rejected
pub fn parse_max_upload(s: &str) -> Result<u64> {
    let max = s.trim().parse::<u64>().map_err(|_| invalid_max_upload(s))?;
    check_max_upload(max)
}

fn check_max_upload(max: u64) -> Result<u64> {
    if max == 0 {
        return Err(invalid_max_upload(&max.to_string()));
    }
    Ok(max)
}

fn invalid_max_upload(value: &str) -> GeoshiftError {
    GeoshiftError::ConfigInvalid {
        key: "max_upload_mb".to_string(),
        reason: format!("Invalid upload limit: {}. Use a positive number of megabytes", value),
    }
}
