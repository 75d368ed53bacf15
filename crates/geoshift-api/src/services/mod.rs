mod preview;
mod process;
mod upload;

pub use preview::PreviewService;
pub use process::{package_collection, ProcessService};
pub use upload::UploadService;
