pub mod bundle;
pub mod crs;
pub mod feature;
pub mod geometry;
pub mod result;

pub use bundle::{
    extension_of, BundleMember, BundleSpec, RequestId, UploadBundle, SHAPEFILE_BUNDLE,
};
pub use crs::{Crs, TARGET_EPSG, TARGET_WKT};
pub use feature::{AttributeValue, Column, ColumnKind, Feature, FeatureCollection};
pub use geometry::{part_count, GeometryType};
pub use result::{ProcessingResult, UploadReceipt};
