use crate::config::ToolsConfig;
use crate::error::PipelineError;
use crate::naming::OutputFormat;
use crate::workers::executor::CommandExecutor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Converts a downloaded GIF into one of the output formats by shelling out
/// to ImageMagick (`convert`) for stills and `ffmpeg` for video.
#[derive(Clone, Debug)]
pub struct Transcoder {
    ffmpeg_path: String,
    convert_path: String,
    executor: CommandExecutor,
}

impl Transcoder {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg_path: tools.ffmpeg_path.clone(),
            convert_path: tools.convert_path.clone(),
            executor: CommandExecutor::new(tools.command_timeout()),
        }
    }

    /// Program and argument list used to produce `dest` from `source`.
    pub fn command_for(
        &self,
        source: &Path,
        dest: &Path,
        format: OutputFormat,
    ) -> (&str, Vec<OsString>) {
        match format {
            OutputFormat::Jpg | OutputFormat::Png => {
                // `[0]` selects the first frame.
                let mut first_frame = source.as_os_str().to_owned();
                first_frame.push("[0]");
                (
                    self.convert_path.as_str(),
                    vec![first_frame, dest.as_os_str().to_owned()],
                )
            }
            OutputFormat::Webm => (
                self.ffmpeg_path.as_str(),
                vec![
                    "-i".into(),
                    source.as_os_str().to_owned(),
                    "-y".into(),
                    "-b:v".into(),
                    "5M".into(),
                    dest.as_os_str().to_owned(),
                ],
            ),
            OutputFormat::Mp4 => (
                self.ffmpeg_path.as_str(),
                vec![
                    "-i".into(),
                    source.as_os_str().to_owned(),
                    "-y".into(),
                    "-crf".into(),
                    "23".into(),
                    "-b:v".into(),
                    "500K".into(),
                    // H.264 in browsers needs 4:2:0 and even dimensions.
                    "-pix_fmt".into(),
                    "yuv420p".into(),
                    "-vf".into(),
                    "scale=trunc(iw/2)*2:trunc(ih/2)*2".into(),
                    "-movflags".into(),
                    "+faststart".into(),
                    dest.as_os_str().to_owned(),
                ],
            ),
        }
    }

    /// Produces `dest`, or returns immediately if it already exists.
    ///
    /// The tool writes to a temporary sibling that is renamed into place only
    /// after it succeeds, so `dest` never holds a partial conversion.
    pub async fn convert(
        &self,
        source: &Path,
        dest: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, PipelineError> {
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            tracing::debug!(dest = ?dest, format = %format, "Output already present, skipping conversion");
            return Ok(dest.to_path_buf());
        }

        let tmp = partial_path(dest, format);
        let (program, args) = self.command_for(source, &tmp, format);
        tracing::info!(source = ?source, format = %format, "Converting");

        if let Err(e) = self.run(program, &args, &tmp).await {
            discard(&tmp).await;
            return Err(e);
        }

        tokio::fs::rename(&tmp, dest).await.map_err(|e| {
            PipelineError::io(format!("failed to move conversion to {}", dest.display()), e)
        })?;

        metrics::counter!("gif_conversions_total", "format" => format.extension()).increment(1);

        Ok(dest.to_path_buf())
    }

    async fn run(&self, program: &str, args: &[OsString], output: &Path) -> Result<(), PipelineError> {
        self.executor.execute(program, args, None).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(PipelineError::MissingOutput {
                program: program.to_string(),
                path: output.display().to_string(),
            });
        }
        Ok(())
    }
}

/// `<stem>.part-<uuid>.<ext>` next to `dest`. The extension is kept because
/// both tools pick the output format from it.
fn partial_path(dest: &Path, format: OutputFormat) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(
        "{}.part-{}.{}",
        stem,
        uuid::Uuid::new_v4(),
        format.extension()
    ))
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = ?path, "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = ?path, error = %e, "Failed to remove partial output"),
    }
}
