//! Lifecycle Reaper: deferred, best-effort cleanup of single requests.

use geoshift_core::models::RequestId;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::artifact::ArtifactStore;

/// Schedules purges of single requests after a fixed delay.
///
/// Only the triggering request's artifacts are removed; other requests in
/// flight are never touched.
#[derive(Debug, Clone)]
pub struct Reaper {
    store: ArtifactStore,
    delay: Duration,
}

impl Reaper {
    pub fn new(store: ArtifactStore, delay: Duration) -> Self {
        Self { store, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Purge `request_id` once the delivery delay has elapsed.
    ///
    /// Failures are logged and otherwise dropped: by the time this runs the
    /// response has already been delivered.
    pub fn schedule(&self, request_id: RequestId) -> JoinHandle<()> {
        self.schedule_in(request_id, self.delay)
    }

    /// Purge `request_id` after `delay`, whatever state it is in by then
    pub fn schedule_in(&self, request_id: RequestId, delay: Duration) -> JoinHandle<()> {
        let store = self.store.clone();

        tracing::debug!(request_id = %request_id, delay_secs = delay.as_secs_f64(), "Scheduled cleanup");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let outcome = tokio::task::spawn_blocking(move || store.purge(request_id)).await;
            match outcome {
                Ok(Ok(removed)) => {
                    tracing::info!(request_id = %request_id, removed, "Cleaned up request artifacts");
                }
                Ok(Err(e)) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Cleanup failed");
                }
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Cleanup task aborted");
                }
            }
        })
    }
}
