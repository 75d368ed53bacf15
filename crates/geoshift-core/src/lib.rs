//! geoshift core - domain models, configuration and vector format I/O
//!
//! This crate contains the data model shared by the upload, processing and
//! preview paths, plus the readers and writer for the supported formats.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;

pub use error::{ErrorKind, GeoshiftError, Result};
