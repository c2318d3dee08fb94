pub mod upload;

pub use upload::{FetchParams, UploadParams, UploadResult};
