use geoshift_core::config::LayeredConfig;
use geoshift_core::error::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub cors_origin: String,
    pub config_file: Option<PathBuf>,
    pub service: LayeredConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Service settings are layered: defaults, then the TOML file named by
    /// `GEOSHIFT_CONFIG` (if any), then `GEOSHIFT_*` variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("GEOSHIFT_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3001);

        let cors_origin =
            env::var("GEOSHIFT_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let config_file = env::var("GEOSHIFT_CONFIG").ok().map(PathBuf::from);

        let mut service = LayeredConfig::with_defaults();
        if let Some(path) = &config_file {
            service = service.load_from_file(path)?;
        }
        let service = service.load_from_env();

        Ok(Self {
            port,
            cors_origin,
            config_file,
            service,
        })
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn storage_root(&self) -> &PathBuf {
        &self.service.storage_root.value
    }

    pub fn reaper_delay(&self) -> Duration {
        Duration::from_secs(self.service.reaper_delay_secs.value)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.service.retention_secs.value)
    }

    /// Request body limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.service.max_upload_mb.value.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}
