//! Artifact Store: the filesystem root shared by all requests.
//!
//! Layout under `root`, all flat:
//! - `{request_id}_{filename}` uploaded inputs
//! - `{request_id}/` output directory of the latest `process` run
//! - `{request_id}.zip` result archive
//!
//! Upload descriptors are kept in memory next to the files so downstream
//! readers get companion paths from the descriptor instead of re-deriving
//! them from names on disk.

use geoshift_core::error::{GeoshiftError, Result};
use geoshift_core::formats::SourceFiles;
use geoshift_core::models::{RequestId, UploadBundle};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    bundles: Arc<RwLock<HashMap<RequestId, UploadBundle>>>,
}

impl ArtifactStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        tracing::debug!(root = %root.display(), "Opened artifact store");

        Ok(Self {
            root,
            bundles: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_path(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }

    pub fn output_dir(&self, request_id: RequestId) -> PathBuf {
        self.root.join(request_id.to_string())
    }

    pub fn archive_path(&self, request_id: RequestId) -> PathBuf {
        self.root.join(format!("{}.zip", request_id))
    }

    /// Record a fully persisted upload
    pub fn register(&self, bundle: UploadBundle) {
        self.write_index().insert(bundle.request_id, bundle);
    }

    /// Descriptor of a registered upload
    pub fn bundle(&self, request_id: RequestId) -> Result<UploadBundle> {
        self.read_index()
            .get(&request_id)
            .cloned()
            .ok_or_else(|| GeoshiftError::UploadNotFound {
                request_id: request_id.to_string(),
            })
    }

    /// Resolve the stored paths for `filename` of an upload.
    ///
    /// For a multi-part bundle every other member is attached as a companion,
    /// keyed by its extension.
    pub fn source_files(&self, request_id: RequestId, filename: &str) -> Result<SourceFiles> {
        let bundle = self.bundle(request_id)?;
        let primary = bundle.member(filename).ok_or_else(|| GeoshiftError::FileNotInUpload {
            request_id: request_id.to_string(),
            filename: filename.to_string(),
        })?;

        let source = bundle.companions_of(primary).fold(
            SourceFiles::new(self.input_path(&primary.stored_name), &primary.logical_name),
            |source, member| source.with_companion(&member.extension, self.input_path(&member.stored_name)),
        );

        Ok(source)
    }

    /// Empty (or create) the output directory of a request
    pub fn prepare_output_dir(&self, request_id: RequestId) -> Result<PathBuf> {
        let dir = self.output_dir(request_id);
        remove_dir_if_exists(&dir)?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Path of the result archive, if one was produced
    pub fn existing_archive(&self, request_id: RequestId) -> Result<PathBuf> {
        let path = self.archive_path(request_id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(GeoshiftError::ArchiveNotFound {
                request_id: request_id.to_string(),
            })
        }
    }

    /// Remove every artifact of one request and forget its descriptor.
    ///
    /// Already-removed artifacts are skipped, so purging twice is harmless.
    /// Returns the number of filesystem entries removed.
    pub fn purge(&self, request_id: RequestId) -> Result<usize> {
        let bundle = self.write_index().remove(&request_id);
        let mut removed = 0;
        let mut first_error = None;

        let inputs = bundle.iter().flat_map(|b| b.members.iter()).map(|m| self.input_path(&m.stored_name));
        for path in inputs.chain(std::iter::once(self.archive_path(request_id))) {
            match remove_file_if_exists(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match remove_dir_if_exists(&self.output_dir(request_id)) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Delete stored inputs of an upload that never got registered
    pub(crate) fn discard_inputs(&self, stored_names: &[String]) {
        for name in stored_names {
            if let Err(e) = remove_file_if_exists(&self.input_path(name)) {
                tracing::warn!(stored_name = %name, error = %e, "Failed to discard partial upload");
            }
        }
    }

    fn read_index(&self) -> RwLockReadGuard<'_, HashMap<RequestId, UploadBundle>> {
        self.bundles.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, HashMap<RequestId, UploadBundle>> {
        self.bundles.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoshift_core::models::{extension_of, BundleMember};
    use tempfile::tempdir;

    fn bundle(id: RequestId, names: &[&str], multi: bool) -> UploadBundle {
        UploadBundle {
            request_id: id,
            base_name: multi.then(|| "parcels".to_string()),
            is_multi_part: multi,
            canonical_filename: names[0].to_string(),
            members: names
                .iter()
                .map(|n| BundleMember {
                    logical_name: n.to_string(),
                    stored_name: format!("{}_{}", id, n),
                    extension: extension_of(n),
                })
                .collect(),
        }
    }

    #[test]
    fn test_layout_is_flat_and_scoped() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("store")).unwrap();
        let id = RequestId::generate();

        assert!(store.root().is_dir());
        assert_eq!(store.output_dir(id), store.root().join(id.to_string()));
        assert_eq!(store.archive_path(id), store.root().join(format!("{}.zip", id)));
    }

    #[test]
    fn test_source_files_attach_bundle_companions() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = RequestId::generate();
        store.register(bundle(id, &["parcels.shp", "parcels.shx", "parcels.prj"], true));

        let source = store.source_files(id, "parcels.shp").unwrap();
        assert_eq!(source.primary, store.input_path(&format!("{}_parcels.shp", id)));
        assert_eq!(source.companion("shx"), Some(store.input_path(&format!("{}_parcels.shx", id)).as_path()));
        assert!(source.companion("prj").is_some());
        assert!(source.companion("dbf").is_none());
    }

    #[test]
    fn test_unknown_upload_and_file() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = RequestId::generate();

        assert!(matches!(store.source_files(id, "a.kml"), Err(GeoshiftError::UploadNotFound { .. })));

        store.register(bundle(id, &["a.kml"], false));
        assert!(matches!(store.source_files(id, "b.kml"), Err(GeoshiftError::FileNotInUpload { .. })));
    }

    #[test]
    fn test_prepare_output_dir_clears_previous_run() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = RequestId::generate();

        let out = store.prepare_output_dir(id).unwrap();
        std::fs::write(out.join("stale.txt"), b"old").unwrap();

        let out = store.prepare_output_dir(id).unwrap();
        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_purge_only_touches_one_request() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let (a, b) = (RequestId::generate(), RequestId::generate());

        for id in [a, b] {
            let bundle = bundle(id, &["a.geojson"], false);
            for name in bundle.stored_file_names() {
                std::fs::write(store.input_path(&name), b"{}").unwrap();
            }
            store.register(bundle);
            std::fs::write(store.prepare_output_dir(id).unwrap().join("processed.shp"), b"x").unwrap();
            std::fs::write(store.archive_path(id), b"zip").unwrap();
        }

        assert_eq!(store.purge(a).unwrap(), 3);
        assert!(store.bundle(a).is_err());
        assert!(matches!(store.existing_archive(a), Err(GeoshiftError::ArchiveNotFound { .. })));

        assert!(store.bundle(b).is_ok());
        assert!(store.existing_archive(b).is_ok());
        assert!(store.output_dir(b).is_dir());

        // second purge is a no-op
        assert_eq!(store.purge(a).unwrap(), 0);
    }
}
