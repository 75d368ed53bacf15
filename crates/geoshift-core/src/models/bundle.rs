//! Request identifiers and upload bundle descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque token scoping every artifact of one processing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A multi-file format whose members must travel together
#[derive(Debug, Clone, Copy)]
pub struct BundleSpec {
    pub format_name: &'static str,
    /// Extension (with leading dot, lower-case) that marks an upload as this bundle
    pub primary_extension: &'static str,
    /// Extensions that must all be present
    pub required_extensions: &'static [&'static str],
}

/// ESRI Shapefile: geometry, index and projection are mandatory
pub const SHAPEFILE_BUNDLE: BundleSpec = BundleSpec {
    format_name: "Shapefile",
    primary_extension: ".shp",
    required_extensions: &[".shp", ".shx", ".prj"],
};

/// One stored file of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMember {
    /// Name downstream operations refer to (e.g. `parcels.shp`)
    pub logical_name: String,
    /// File name inside the artifact store (`{request_id}_{logical_name}`)
    pub stored_name: String,
    /// Lower-case extension without the dot, empty when there is none
    pub extension: String,
}

/// Descriptor of one persisted upload. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBundle {
    pub request_id: RequestId,
    /// Shared stem of a multi-file bundle
    pub base_name: Option<String>,
    pub is_multi_part: bool,
    /// Name to pass to `process`/`preview`
    pub canonical_filename: String,
    pub members: Vec<BundleMember>,
}

impl UploadBundle {
    /// Stored file names in upload order
    pub fn stored_file_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.stored_name.clone()).collect()
    }

    /// Find the member a caller refers to by its logical name
    pub fn member(&self, filename: &str) -> Option<&BundleMember> {
        self.members.iter().find(|m| m.logical_name == filename)
    }

    /// Members of the same bundle other than `primary`
    pub fn companions_of<'a>(
        &'a self,
        primary: &'a BundleMember,
    ) -> impl Iterator<Item = &'a BundleMember> + 'a {
        self.members
            .iter()
            .filter(move |m| self.is_multi_part && m.stored_name != primary.stored_name)
    }
}

/// Lower-case extension of a file name, without the dot
pub fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
