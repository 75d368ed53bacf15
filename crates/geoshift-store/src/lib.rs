//! geoshift store - per-request artifacts on disk
//!
//! Uploaded inputs, output directories and result archives all live under a
//! single root directory and are scoped by request identifier.

pub mod archive;
pub mod artifact;
pub mod assembler;
pub mod reaper;

pub use archive::zip_directory;
pub use artifact::ArtifactStore;
pub use assembler::{missing_extensions, sanitize_file_name, UploadAssembler, UploadPart};
pub use reaper::Reaper;
