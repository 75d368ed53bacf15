mod download;
mod health;
mod preview;
mod process;
mod upload;

pub use download::handle_download;
pub use health::health_check;
pub use preview::handle_preview;
pub use process::handle_process;
pub use upload::handle_upload;
