pub mod assets;
pub mod health;
pub mod upload;

pub use assets::{fetch_asset, get_asset};
pub use health::{health_check, metrics_endpoint, readiness_check, root};
pub use upload::upload;
