use crate::error::PipelineError;
use crate::naming::GIF_CONTENT_TYPE;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use service_core::error::AppError;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Parses and checks a user-supplied source URL.
pub fn validate_source_url(raw: &str) -> Result<Url, PipelineError> {
    let invalid = |reason: String| PipelineError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {:?}", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// True when the header's media type is `image/gif`, ignoring parameters and
/// case.
pub fn is_gif_content_type(header: &str) -> bool {
    header
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(GIF_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Fetches source GIFs over HTTP.
#[derive(Clone, Debug)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gif-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Downloads `url` to `dest` and returns the file size.
    ///
    /// An existing `dest` is reused without touching the network. The body is
    /// streamed to a temporary sibling and renamed into place, so `dest`
    /// only ever appears complete.
    pub async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, PipelineError> {
        if let Ok(meta) = tokio::fs::metadata(dest).await {
            tracing::debug!(url = %url, dest = ?dest, "Source already downloaded");
            return Ok(meta.len());
        }

        let download_err = |source| PipelineError::Download {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(download_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::DownloadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !content_type.as_deref().is_some_and(is_gif_content_type) {
            tracing::warn!(url = %url, content_type = ?content_type, "Rejecting non-GIF source");
            return Err(PipelineError::NotAGif {
                url: url.to_string(),
                content_type,
            });
        }

        let tmp = dest.with_extension(format!("part-{}", uuid::Uuid::new_v4()));
        let written = match write_body(response, &tmp).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into_pipeline_error(url));
            }
        };

        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| PipelineError::io(format!("failed to move download to {}", dest.display()), e))?;

        metrics::counter!("gif_downloads_total").increment(1);
        metrics::counter!("gif_downloaded_bytes_total").increment(written);

        Ok(written)
    }
}

enum BodyError {
    Http(reqwest::Error),
    Io(std::io::Error),
}

impl BodyError {
    fn into_pipeline_error(self, url: &Url) -> PipelineError {
        match self {
            BodyError::Http(source) => PipelineError::Download {
                url: url.to_string(),
                source,
            },
            BodyError::Io(e) => PipelineError::io("failed to write download", e),
        }
    }
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64, BodyError> {
    let mut file = tokio::fs::File::create(path).await.map_err(BodyError::Io)?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Http)?;
        file.write_all(&chunk).await.map_err(BodyError::Io)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(BodyError::Io)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_essence_matching() {
        assert!(is_gif_content_type("image/gif"));
        assert!(is_gif_content_type("IMAGE/GIF"));
        assert!(is_gif_content_type("image/gif; charset=binary"));
        assert!(!is_gif_content_type("image/png"));
        assert!(!is_gif_content_type("text/html; image/gif"));
        assert!(!is_gif_content_type(""));
    }

    #[test]
    fn only_http_urls_are_accepted() {
        assert!(validate_source_url("https://example.com/a.gif").is_ok());
        assert!(validate_source_url("http://127.0.0.1:8080/a.gif").is_ok());
        assert!(matches!(
            validate_source_url("file:///etc/passwd"),
            Err(PipelineError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_source_url("not a url"),
            Err(PipelineError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn existing_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cached.gif");
        tokio::fs::write(&dest, b"GIF89a....").await.unwrap();

        // Port 9 (discard) on localhost: any real request would fail.
        let url = validate_source_url("http://127.0.0.1:9/cat.gif").unwrap();
        let downloader = Downloader::new(Duration::from_secs(1)).unwrap();
        assert_eq!(downloader.fetch(&url, &dest).await.unwrap(), 10);
    }
}
