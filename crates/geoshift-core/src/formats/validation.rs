//! Pre-read checks shared by the format readers.
//!
//! Findings are collected into a [`FormatValidation`]; only errors abort a
//! read, warnings are logged by the registry.

use crate::error::{GeoshiftError, Result};
use crate::formats::{FormatValidation, SourceFiles};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

pub struct FormatValidator;

impl FormatValidator {
    /// The primary file must exist and be a regular file
    pub fn validate_file_exists(path: &Path) -> FormatValidation {
        let finding = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => None,
            Ok(_) => Some(format!("{} is not a regular file", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Some(format!("File not found: {}", path.display()))
            }
            Err(e) => Some(format!("Cannot access {}: {}", path.display(), e)),
        };

        FormatValidation {
            errors: finding.into_iter().collect(),
            warnings: Vec::new(),
        }
    }

    /// Companions of a multi-file source: required ones must be attached and
    /// on disk, missing optional ones only warn
    pub fn validate_companions(
        source: &SourceFiles,
        required_extensions: &[&str],
        optional_extensions: &[&str],
    ) -> FormatValidation {
        let present = |ext: &str| source.companion(ext).is_some_and(Path::exists);

        let errors = required_extensions
            .iter()
            .copied()
            .filter(|ext| !present(*ext))
            .map(|ext| match source.companion(ext) {
                Some(path) => format!("Missing required file: {}", path.display()),
                None => format!("Missing required file: .{}", ext),
            })
            .collect();

        let warnings = optional_extensions
            .iter()
            .copied()
            .filter(|ext| !present(*ext))
            .map(|ext| format!("Optional .{} companion not supplied", ext))
            .collect();

        FormatValidation { errors, warnings }
    }

    /// Well-formedness of an XML document with at least one element
    pub fn validate_xml_str(content: &str) -> FormatValidation {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut has_root = false;
        let problem = loop {
            match reader.read_event() {
                Ok(Event::Eof) if has_root => break None,
                Ok(Event::Eof) => break Some("no root element".to_string()),
                Ok(Event::Start(_) | Event::Empty(_)) => has_root = true,
                Ok(_) => {}
                Err(e) => break Some(format!("at byte {}: {}", reader.buffer_position(), e)),
            }
        };

        FormatValidation {
            errors: problem.map(|p| format!("Malformed XML {}", p)).into_iter().collect(),
            warnings: Vec::new(),
        }
    }

    pub fn validate_xml_structure(path: &Path) -> FormatValidation {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::validate_xml_str(&content),
            Err(e) => unreadable(path, e),
        }
    }

    /// Well-formedness of a JSON document
    pub fn validate_json_structure(path: &Path) -> FormatValidation {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => return unreadable(path, e),
        };

        let errors = serde_json::from_str::<serde_json::Value>(&content)
            .err()
            .map(|e| format!("Malformed JSON at line {}, column {}: {}", e.line(), e.column(), e))
            .into_iter()
            .collect();

        FormatValidation { errors, warnings: Vec::new() }
    }

    pub fn merge_validations(validations: Vec<FormatValidation>) -> FormatValidation {
        validations.into_iter().fold(FormatValidation::default(), |mut acc, v| {
            acc.errors.extend(v.errors);
            acc.warnings.extend(v.warnings);
            acc
        })
    }

    /// Turn error findings into a [`GeoshiftError::FormatValidation`]
    pub fn validation_to_result(validation: &FormatValidation, format_name: &str) -> Result<()> {
        if validation.is_valid() {
            return Ok(());
        }
        Err(GeoshiftError::FormatValidation {
            format: format_name.to_string(),
            reason: validation.errors.join("; "),
        })
    }
}

fn unreadable(path: &Path, e: std::io::Error) -> FormatValidation {
    FormatValidation {
        errors: vec![format!("Cannot read {}: {}", path.display(), e)],
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file() {
        let validation = FormatValidator::validate_file_exists(Path::new("/nonexistent/x.geojson"));
        assert!(!validation.is_valid());
    }

    #[test]
    fn test_companions_required_and_optional() {
        let dir = tempfile::tempdir().unwrap();
        let shx = dir.path().join("a.shx");
        fs::write(&shx, b"x").unwrap();

        let source = SourceFiles::new(dir.path().join("a.shp"), "a.shp")
            .with_companion("shx", &shx)
            .with_companion("prj", dir.path().join("gone.prj"));

        let validation = FormatValidator::validate_companions(&source, &["shx", "prj"], &["dbf"]);
        assert_eq!(validation.errors.len(), 1);
        assert!(validation.errors[0].contains("gone.prj"));
        assert!(validation.has_warnings());
        assert!(validation.warnings[0].contains(".dbf"));
    }

    #[test]
    fn test_xml_validation() {
        assert!(FormatValidator::validate_xml_str("<kml><Document/></kml>").is_valid());
        assert!(!FormatValidator::validate_xml_str("not xml at all").is_valid());
        assert!(!FormatValidator::validate_xml_str("<kml><Document></kml>").is_valid());
    }

    #[test]
    fn test_validation_to_result_joins_errors() {
        let validation = FormatValidation {
            errors: vec!["a".to_string(), "b".to_string()],
            warnings: Vec::new(),
        };
        let err = FormatValidator::validation_to_result(&validation, "KML").unwrap_err();
        assert_eq!(err.to_string(), "Invalid KML input: a; b");
    }
}
