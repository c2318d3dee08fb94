use crate::config::{PipelineConfig, ToolsConfig};
use crate::dtos::UploadResult;
use crate::error::PipelineError;
use crate::naming::{self, OutputFormat};
use crate::services::downloader::validate_source_url;
use crate::services::{Downloader, Storage};
use crate::workers::probe::gif_dimensions;
use crate::workers::transcoder::Transcoder;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// download → probe → convert → publish, one request at a time.
///
/// Nothing here coordinates concurrent requests for the same URL: they share
/// file names in the work directory and in storage.
#[derive(Clone)]
pub struct Pipeline {
    downloader: Downloader,
    transcoder: Transcoder,
    storage: Arc<dyn Storage>,
    work_dir: PathBuf,
    public_base_url: String,
    preview: OutputFormat,
    cleanup: bool,
}

impl Pipeline {
    pub async fn new(
        config: &PipelineConfig,
        tools: &ToolsConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, AppError> {
        let work_dir = PathBuf::from(&config.work_dir);
        tokio::fs::create_dir_all(&work_dir).await.map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to create work dir {}: {}",
                work_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            downloader: Downloader::new(config.download_timeout())?,
            transcoder: Transcoder::new(tools),
            storage,
            work_dir,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            preview: config.preview_format.output_format(),
            cleanup: config.cleanup_work_files,
        })
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Output formats in the order they are produced.
    pub fn formats(&self) -> [OutputFormat; 3] {
        [OutputFormat::Webm, OutputFormat::Mp4, self.preview]
    }

    pub fn supports(&self, format: OutputFormat) -> bool {
        self.formats().contains(&format)
    }

    pub fn asset_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Runs the whole pipeline for `raw_url` and describes the result.
    pub async fn process(&self, raw_url: &str) -> Result<UploadResult, PipelineError> {
        let started = Instant::now();
        let result = self.run(raw_url).await;

        metrics::histogram!("gif_pipeline_duration_seconds").record(started.elapsed().as_secs_f64());
        if let Err(ref e) = result {
            metrics::counter!("gif_pipeline_failures_total", "kind" => e.kind()).increment(1);
            tracing::error!(url = %raw_url, kind = e.kind(), error = %e, "Pipeline failed");
        }

        result
    }

    /// Makes sure the `format` output for `raw_url` is in storage, running the
    /// pipeline if it is not. Returns the asset key.
    pub async fn ensure(&self, raw_url: &str, format: OutputFormat) -> Result<String, PipelineError> {
        validate_source_url(raw_url)?;
        let key = naming::asset_key(raw_url.trim(), format);

        if !self.storage.exists(&key).await.map_err(storage_err)? {
            self.process(raw_url).await?;
        }

        Ok(key)
    }

    /// Keys hash the URL as the client sent it (trimmed), not its parsed
    /// form, so a caller can derive them from `u` alone.
    async fn run(&self, raw_url: &str) -> Result<UploadResult, PipelineError> {
        let url = validate_source_url(raw_url)?;
        let source = raw_url.trim();
        let gif_path = self.work_dir.join(naming::source_key(source));

        tracing::info!(url = %url, "Downloading");
        let size = self.downloader.fetch(&url, &gif_path).await?;
        tracing::info!(url = %url, bytes = size, "Downloaded");

        let (width, height) = gif_dimensions(&gif_path).await?;

        for format in self.formats() {
            self.publish(source, &gif_path, format).await?;
        }

        if self.cleanup {
            remove_work_file(&gif_path).await?;
        }

        let url_for = |format: OutputFormat| self.asset_url(&naming::asset_key(source, format));
        let preview = url_for(self.preview);
        Ok(UploadResult {
            mp4url: url_for(OutputFormat::Mp4),
            webmurl: url_for(OutputFormat::Webm),
            jpgurl: (self.preview == OutputFormat::Jpg).then(|| preview.clone()),
            pngurl: (self.preview == OutputFormat::Png).then_some(preview),
            width,
            height,
        })
    }

    async fn publish(&self, source: &str, gif_path: &Path, format: OutputFormat) -> Result<(), PipelineError> {
        let key = naming::asset_key(source, format);

        if self.storage.exists(&key).await.map_err(storage_err)? {
            tracing::debug!(key = %key, "Already published, skipping");
            return Ok(());
        }

        let output = self.work_dir.join(&key);
        self.transcoder.convert(gif_path, &output, format).await?;

        tracing::info!(key = %key, content_type = format.content_type(), "Publishing");
        self.storage
            .put_file(&key, &output, format.content_type())
            .await
            .map_err(storage_err)?;

        if self.cleanup && !self.is_storage_file(&output, &key) {
            remove_work_file(&output).await?;
        }

        Ok(())
    }

    /// True when `output` is the very file storage serves for `key`, which
    /// happens when local storage is rooted at the work dir.
    fn is_storage_file(&self, output: &Path, key: &str) -> bool {
        let Some(stored) = self.storage.local_path(key) else {
            return false;
        };
        match (std::fs::canonicalize(output), std::fs::canonicalize(stored)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

fn storage_err(e: AppError) -> PipelineError {
    PipelineError::Storage(anyhow::Error::new(e))
}

async fn remove_work_file(path: &Path) -> Result<(), PipelineError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(format!("failed to remove {}", path.display()), e)),
    }
}
