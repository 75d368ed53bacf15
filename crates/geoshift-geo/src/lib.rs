//! geoshift geo - geometry validation, CRS transformation and map previews
//!
//! This crate holds the processing steps that operate on an in-memory
//! feature collection: the part-count validator, the reprojector, spatial
//! helpers and the preview document renderer.

pub mod preview;
pub mod spatial;
pub mod transform;
pub mod validation;
