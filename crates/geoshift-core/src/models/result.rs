//! Outcomes reported back to callers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::bundle::{RequestId, UploadBundle};
use super::crs::Crs;

/// What a successful upload hands back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub request_id: RequestId,
    pub canonical_filename: String,
    pub stored_file_names: Vec<String>,
}

impl From<&UploadBundle> for UploadReceipt {
    fn from(bundle: &UploadBundle) -> Self {
        Self {
            request_id: bundle.request_id,
            canonical_filename: bundle.canonical_filename.clone(),
            stored_file_names: bundle.stored_file_names(),
        }
    }
}

/// Terminal output of the process pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub archive_path: PathBuf,
    pub source_crs: String,
    pub target_crs: String,
    pub message: String,
}

impl ProcessingResult {
    pub fn new(archive_path: PathBuf, source: &Crs, target: &Crs) -> Self {
        Self {
            archive_path,
            source_crs: source.to_string(),
            target_crs: target.to_string(),
            message: format!(
                "Coordinate reference system transformation:\n source CRS: {}\n target CRS: {}",
                source, target
            ),
        }
    }
}
