use service_core::error::AppError;
use thiserror::Error;

/// Failures of the fetch → convert → publish pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to download {url:?}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url:?} returned status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("{url:?} is not an image/gif")]
    NotAGif { url: String, content_type: Option<String> },

    #[error("error getting dimensions: {0}")]
    Dimensions(#[source] image::ImageError),

    #[error("{program} failed: {stderr}")]
    Command { program: String, stderr: String },

    #[error("{program} timed out after {timeout_secs} seconds")]
    CommandTimeout { program: String, timeout_secs: u64 },

    #[error("{program} exited successfully but did not produce {path}")]
    MissingOutput { program: String, path: String },

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidUrl { .. } => "invalid_url",
            PipelineError::Download { .. } | PipelineError::DownloadStatus { .. } => "download",
            PipelineError::NotAGif { .. } => "not_a_gif",
            PipelineError::Dimensions(_) => "dimensions",
            PipelineError::Command { .. }
            | PipelineError::CommandTimeout { .. }
            | PipelineError::MissingOutput { .. } => "conversion",
            PipelineError::Storage(_) => "storage",
            PipelineError::Io { .. } => "io",
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidUrl { .. } => AppError::BadRequest(anyhow::Error::new(err)),
            other => AppError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn not_a_gif_message() {
        let err = PipelineError::NotAGif {
            url: "http://x/y.png".to_string(),
            content_type: Some("image/png".to_string()),
        };
        assert_eq!(err.to_string(), "\"http://x/y.png\" is not an image/gif");
        assert_eq!(err.kind(), "not_a_gif");
    }

    #[test]
    fn pipeline_failures_are_500() {
        let err: AppError = PipelineError::Command {
            program: "ffmpeg".to_string(),
            stderr: "boom".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_url_is_400() {
        let err: AppError = PipelineError::InvalidUrl {
            url: "ftp://x".to_string(),
            reason: "unsupported scheme".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
