//! Vector format readers and the Shapefile writer
//!
//! Each input format implements `FormatReader`; `FormatRegistry` picks the
//! reader from the logical file name's extension. Readers receive the primary
//! file plus the companions registered with the upload as `SourceFiles`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{GeoshiftError, Result};
use crate::models::{extension_of, FeatureCollection};

pub mod geojson;
pub mod kml;
pub mod shapefile;
pub mod shapefile_writer;
pub mod validation;

pub use self::geojson::{to_geojson_collection, GeoJsonReader};
pub use self::kml::{KmlReader, KmzReader};
pub use self::shapefile::ShapefileFormatReader;
pub use self::shapefile_writer::{ShapefileWriter, OUTPUT_STEM};
pub use validation::FormatValidator;

/// Format reader trait that all format implementations must implement
#[async_trait]
pub trait FormatReader: Send + Sync {
    /// Read a feature collection from the given source files
    async fn read(&self, source: &SourceFiles) -> Result<FeatureCollection>;

    /// Get supported file extensions (e.g., ["shp"], ["geojson", "json"])
    fn supported_extensions(&self) -> &[&str];

    /// Get human-readable format name (e.g., "Shapefile", "GeoJSON")
    fn format_name(&self) -> &str;

    /// Validate file structure without full read (optional)
    async fn validate(&self, _source: &SourceFiles) -> Result<FormatValidation> {
        Ok(FormatValidation::default())
    }
}

/// Result of format validation
#[derive(Debug, Clone, Default)]
pub struct FormatValidation {
    /// Validation errors that prevent reading
    pub errors: Vec<String>,

    /// Warnings that don't prevent reading but indicate potential issues
    pub warnings: Vec<String>,
}

impl FormatValidation {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Input handed to a reader: the primary file and its registered companions.
#[derive(Debug, Clone)]
pub struct SourceFiles {
    /// Path of the file the caller named
    pub primary: PathBuf,

    /// Name the caller used for it (e.g. `parcels.shp`); drives format
    /// detection and the dataset name
    pub logical_name: String,

    /// Companion paths keyed by lower-case extension without the dot
    companions: BTreeMap<String, PathBuf>,
}

impl SourceFiles {
    pub fn new(primary: impl Into<PathBuf>, logical_name: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            logical_name: logical_name.into(),
            companions: BTreeMap::new(),
        }
    }

    /// Register a companion file under its extension
    pub fn with_companion(mut self, extension: &str, path: impl Into<PathBuf>) -> Self {
        self.companions
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), path.into());
        self
    }

    /// Companion path for an extension, if the upload carried one
    pub fn companion(&self, extension: &str) -> Option<&Path> {
        self.companions
            .get(&extension.trim_start_matches('.').to_ascii_lowercase())
            .map(PathBuf::as_path)
    }

    /// Dataset name: the logical name without its extension
    pub fn dataset_name(&self) -> String {
        Path::new(&self.logical_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string()
    }
}

/// Central registry for format readers
pub struct FormatRegistry {
    readers: Vec<Box<dyn FormatReader>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Register a format reader
    pub fn register(&mut self, reader: Box<dyn FormatReader>) {
        self.readers.push(reader);
    }

    /// Detect format from a file name and return the matching reader
    pub fn detect_format(&self, filename: &str) -> Result<&dyn FormatReader> {
        let extension = extension_of(filename);
        if extension.is_empty() {
            return Err(GeoshiftError::UnsupportedFormat {
                extension: "none".to_string(),
                supported: self.supported_formats(),
            });
        }

        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
            .ok_or_else(|| GeoshiftError::UnsupportedFormat {
                extension,
                supported: self.supported_formats(),
            })
    }

    /// Validate and read a source with the reader its name selects.
    ///
    /// Validation errors abort the read; warnings are logged.
    pub async fn read(&self, source: &SourceFiles) -> Result<FeatureCollection> {
        let reader = self.detect_format(&source.logical_name)?;

        let validation = reader.validate(source).await?;
        for warning in &validation.warnings {
            tracing::warn!(file = %source.logical_name, "{}", warning);
        }
        FormatValidator::validation_to_result(&validation, reader.format_name())?;

        let collection = reader.read(source).await?;
        tracing::debug!(
            file = %source.logical_name,
            format = reader.format_name(),
            features = collection.len(),
            "Read feature collection"
        );
        Ok(collection)
    }

    /// Every extension some registered reader accepts
    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }
}

/// Run file and parsing work on the blocking thread pool
pub(crate) async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| GeoshiftError::TaskFailed(e.to_string()))?
}

impl Default for FormatRegistry {
    /// Registry with every built-in reader
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ShapefileFormatReader));
        registry.register(Box::new(GeoJsonReader));
        registry.register(Box::new(KmlReader));
        registry.register(Box::new(KmzReader));
        registry
    }
}
