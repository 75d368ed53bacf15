//! Error types for geoshift

use thiserror::Error;

/// Coarse classification used by callers to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied something the pipeline refuses (missing companions,
    /// multi-part geometries). Reported with a specific reason.
    Validation,
    /// Reading, transforming, writing or storing failed.
    Processing,
    /// A requested artifact does not exist.
    NotFound,
}

#[derive(Debug, Error)]
pub enum GeoshiftError {
    // Upload errors
    #[error("Missing required files: {}", missing.join(", "))]
    MissingBundleFiles { missing: Vec<String> },

    #[error("No files were uploaded")]
    EmptyUpload,

    #[error("Invalid file name '{name}': {reason}")]
    InvalidFileName { name: String, reason: String },

    #[error("File '{name}' was uploaded more than once")]
    DuplicateFile { name: String },

    // Geometry errors
    #[error("Multi-part {geometry_type} geometry found at feature {feature_index}")]
    MultiPartGeometry {
        geometry_type: String,
        feature_index: usize,
    },

    // Artifact errors
    #[error("No upload found for request {request_id}")]
    UploadNotFound { request_id: String },

    #[error("File '{filename}' is not part of upload {request_id}")]
    FileNotInUpload {
        request_id: String,
        filename: String,
    },

    #[error("Archive not found for request {request_id}")]
    ArchiveNotFound { request_id: String },

    // Format errors
    #[error("Unsupported format '.{extension}'. Supported: {}", supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("{format} error: {message}")]
    FormatError { format: String, message: String },

    #[error("Invalid {format} input: {reason}")]
    FormatValidation { format: String, reason: String },

    // CRS errors
    #[error("Source CRS is undefined; cannot transform naive geometries")]
    UndefinedCrs,

    #[error("Failed to reproject from {from} to {to}: {reason}")]
    Reprojection {
        from: String,
        to: String,
        reason: String,
    },

    // Output errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Archive error: {0}")]
    Archive(String),

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoshiftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeoshiftError::MissingBundleFiles { .. }
            | GeoshiftError::EmptyUpload
            | GeoshiftError::InvalidFileName { .. }
            | GeoshiftError::DuplicateFile { .. }
            | GeoshiftError::MultiPartGeometry { .. } => ErrorKind::Validation,
            GeoshiftError::ArchiveNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Processing,
        }
    }

    pub(crate) fn format(format: &str, message: impl Into<String>) -> Self {
        GeoshiftError::FormatError {
            format: format.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoshiftError>;
