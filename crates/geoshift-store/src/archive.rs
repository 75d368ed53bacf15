//! Packaging of an output directory into the result archive

use geoshift_core::error::{GeoshiftError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip every regular file directly under `dir` into `archive_path`.
///
/// Entries are flat (base names only) and sorted. The archive is written
/// next to its final location and renamed into place, so a failed run never
/// leaves a truncated archive behind. Returns the entry names.
pub fn zip_directory(dir: &Path, archive_path: &Path) -> Result<Vec<String>> {
    let mut files = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();

    if files.is_empty() {
        return Err(GeoshiftError::Archive(format!("No output files in {}", dir.display())));
    }

    let partial = archive_path.with_extension("zip.partial");
    let result = write_archive(&files, &partial).and_then(|entries| {
        std::fs::rename(&partial, archive_path)?;
        Ok(entries)
    });

    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }

    let entries = result?;
    tracing::debug!(
        archive = %archive_path.display(),
        entries = entries.len(),
        "Wrote result archive"
    );
    Ok(entries)
}

fn write_archive(files: &[std::path::PathBuf], target: &Path) -> Result<Vec<String>> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(target)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = Vec::with_capacity(files.len());

    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GeoshiftError::Archive(format!("Unusable file name: {}", path.display())))?
            .to_string();

        zip.start_file(name.as_str(), options)
            .map_err(|e| GeoshiftError::Archive(format!("Failed to add {}: {}", name, e)))?;
        let bytes = std::fs::read(path)?;
        zip.write_all(&bytes)?;
        entries.push(name);
    }

    let mut writer = zip
        .finish()
        .map_err(|e| GeoshiftError::Archive(format!("Failed to finish archive: {}", e)))?;
    writer.flush()?;

    Ok(entries)
}
