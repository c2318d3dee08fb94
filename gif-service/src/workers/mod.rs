mod executor;
mod pipeline;
mod probe;
mod transcoder;

pub use executor::CommandExecutor;
pub use pipeline::Pipeline;
pub use probe::gif_dimensions;
pub use transcoder::Transcoder;
