use crate::error::PipelineError;
use std::path::{Path, PathBuf};

/// Pixel dimensions of the GIF's logical screen.
///
/// Only the header is read; frames are never decoded.
pub async fn gif_dimensions(path: &Path) -> Result<(u32, u32), PipelineError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || image::image_dimensions(&path))
        .await
        .map_err(|e| PipelineError::io("dimension probe panicked", std::io::Error::other(e)))?
        .map_err(PipelineError::Dimensions)
}
