mod request;
mod response;

pub use request::{PreviewQuery, ProcessRequest};
pub use response::HealthResponse;
