pub mod downloader;
pub mod metrics;
pub mod storage;

pub use downloader::Downloader;
pub use metrics::{get_metrics, init_metrics};
pub use storage::{LocalStorage, S3Storage, Storage};
