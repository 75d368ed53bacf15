use geoshift_core::config::DEFAULT_RETENTION_SECS;
use geoshift_core::formats::FormatRegistry;
use geoshift_core::models::Crs;
use geoshift_store::{ArtifactStore, Reaper};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub store: ArtifactStore,
    pub registry: Arc<FormatRegistry>,
    pub reaper: Reaper,
    /// How long an upload may wait for delivery before it is purged
    pub retention: Duration,
    pub target_crs: Crs,
}

impl AppState {
    pub fn new(store: ArtifactStore, reaper_delay: Duration) -> Self {
        Self {
            reaper: Reaper::new(store.clone(), reaper_delay),
            registry: Arc::new(FormatRegistry::default()),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            target_crs: Crs::target(),
            store,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}
