use geoshift_core::models::UploadReceipt;
use geoshift_store::{UploadAssembler, UploadPart};

use crate::error::ApiError;
use crate::state::AppState;

/// Service for persisting uploads
pub struct UploadService;

impl UploadService {
    /// Assemble the uploaded parts into one bundle under a new request id.
    ///
    /// The request is purged once the retention window ends, whether or not
    /// its archive was ever downloaded.
    pub async fn upload(state: &AppState, parts: Vec<UploadPart>) -> Result<UploadReceipt, ApiError> {
        let bundle = UploadAssembler::new(state.store.clone()).assemble(parts).await?;
        state.reaper.schedule_in(bundle.request_id, state.retention);
        Ok(UploadReceipt::from(&bundle))
    }
}
