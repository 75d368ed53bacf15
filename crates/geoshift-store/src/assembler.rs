//! Upload Assembler: turns uploaded parts into a persisted [`UploadBundle`].

use geoshift_core::error::{GeoshiftError, Result};
use geoshift_core::models::{extension_of, BundleMember, BundleSpec, RequestId, UploadBundle, SHAPEFILE_BUNDLE};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::artifact::ArtifactStore;

/// One uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub filename: String,
    pub content: Vec<u8>,
}

impl UploadPart {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

pub struct UploadAssembler {
    store: ArtifactStore,
    spec: BundleSpec,
}

impl UploadAssembler {
    /// Assembler recognising Shapefile bundles
    pub fn new(store: ArtifactStore) -> Self {
        Self::with_spec(store, SHAPEFILE_BUNDLE)
    }

    pub fn with_spec(store: ArtifactStore, spec: BundleSpec) -> Self {
        Self { store, spec }
    }

    /// Validate and persist one upload under a fresh request id.
    ///
    /// Nothing is written when validation fails. If writing fails midway,
    /// files already written for this request are removed before the error
    /// is returned.
    pub async fn assemble(&self, parts: Vec<UploadPart>) -> Result<UploadBundle> {
        if parts.is_empty() {
            return Err(GeoshiftError::EmptyUpload);
        }

        let names = parts
            .iter()
            .map(|p| sanitize_file_name(&p.filename))
            .collect::<Result<Vec<_>>>()?;

        let request_id = RequestId::generate();
        let bundle = self.describe(request_id, &names)?;

        let mut written = Vec::with_capacity(parts.len());
        for (member, part) in bundle.members.iter().zip(&parts) {
            let path = self.store.input_path(&member.stored_name);
            if let Err(e) = tokio::fs::write(&path, &part.content).await {
                tracing::error!(
                    request_id = %request_id,
                    stored_name = %member.stored_name,
                    error = %e,
                    "Failed to store upload, rolling back"
                );
                self.store.discard_inputs(&written);
                return Err(e.into());
            }
            written.push(member.stored_name.clone());
        }

        tracing::info!(
            request_id = %request_id,
            canonical_filename = %bundle.canonical_filename,
            is_multi_part = bundle.is_multi_part,
            file_count = bundle.members.len(),
            "Stored upload"
        );

        self.store.register(bundle.clone());
        Ok(bundle)
    }

    /// Build the descriptor for sanitized names, enforcing bundle completeness
    fn describe(&self, request_id: RequestId, names: &[String]) -> Result<UploadBundle> {
        let primary = names
            .iter()
            .find(|n| format!(".{}", extension_of(n)) == self.spec.primary_extension);

        let Some(primary) = primary else {
            return self.describe_single(request_id, names);
        };

        let missing = missing_extensions(&self.spec, names);
        if !missing.is_empty() {
            tracing::warn!(
                format = self.spec.format_name,
                missing = ?missing,
                "Rejecting incomplete bundle"
            );
            return Err(GeoshiftError::MissingBundleFiles { missing });
        }

        let base_name = file_stem(primary);
        let members = names
            .iter()
            .map(|name| {
                let extension = extension_of(name);
                let logical_name = if extension.is_empty() {
                    base_name.clone()
                } else {
                    format!("{}.{}", base_name, extension)
                };
                BundleMember {
                    stored_name: format!("{}_{}", request_id, logical_name),
                    logical_name,
                    extension,
                }
            })
            .collect::<Vec<_>>();
        ensure_unique(&members)?;

        Ok(UploadBundle {
            request_id,
            canonical_filename: format!("{}{}", base_name, self.spec.primary_extension),
            base_name: Some(base_name),
            is_multi_part: true,
            members,
        })
    }

    fn describe_single(&self, request_id: RequestId, names: &[String]) -> Result<UploadBundle> {
        let members = names
            .iter()
            .map(|name| BundleMember {
                logical_name: name.clone(),
                stored_name: format!("{}_{}", request_id, name),
                extension: extension_of(name),
            })
            .collect::<Vec<_>>();
        ensure_unique(&members)?;

        Ok(UploadBundle {
            request_id,
            base_name: None,
            is_multi_part: false,
            canonical_filename: names[0].clone(),
            members,
        })
    }
}

/// Mandatory extensions (with leading dot) absent from `filenames`, sorted
pub fn missing_extensions(spec: &BundleSpec, filenames: &[String]) -> Vec<String> {
    let present: HashSet<String> = filenames.iter().map(|n| format!(".{}", extension_of(n))).collect();

    spec.required_extensions
        .iter()
        .filter(|ext| !present.contains(**ext))
        .map(|ext| ext.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reduce a client-supplied name to a bare file name.
///
/// Directory components are dropped; names that resolve to nothing, or to
/// `.`/`..`, are rejected.
pub fn sanitize_file_name(raw: &str) -> Result<String> {
    let normalized = raw.replace('\\', "/");
    let name = normalized.rsplit('/').next().unwrap_or_default().trim();

    let reason = if name.is_empty() {
        Some("empty file name")
    } else if name == "." || name == ".." {
        Some("not a file name")
    } else if name.chars().any(|c| c.is_control()) {
        Some("contains control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(GeoshiftError::InvalidFileName {
            name: raw.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(name.to_string()),
    }
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}

fn ensure_unique(members: &[BundleMember]) -> Result<()> {
    let mut seen = HashSet::new();
    for member in members {
        if !seen.insert(member.stored_name.as_str()) {
            return Err(GeoshiftError::DuplicateFile {
                name: member.logical_name.clone(),
            });
        }
    }
    Ok(())
}
