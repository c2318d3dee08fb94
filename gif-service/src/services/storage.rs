use crate::config::{StorageBackend, StorageConfig};
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Where converted assets are published.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Publishes the file at `path` under `key`.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), AppError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Direct URL for `key` when clients can read it without going through
    /// this service.
    fn public_url(&self, key: &str) -> Option<String>;

    /// Filesystem location of `key` for backends that keep files on local disk.
    fn local_path(&self, _key: &str) -> Option<PathBuf> {
        None
    }

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Builds the backend selected by `STORAGE_BACKEND`.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn Storage>, AppError> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::new(&config.local_path).await?)),
        StorageBackend::S3 => {
            let bucket = config.s3_bucket.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("S3 bucket is not configured"))
            })?;
            let storage = S3Storage::from_env(
                bucket,
                config.s3_region.clone(),
                config.s3_public_url.clone(),
            )
            .await;
            Ok(Arc::new(storage))
        }
    }
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_file(&self, key: &str, path: &Path, _content_type: &str) -> Result<(), AppError> {
        let dest = self.path_for(key);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Work dir and storage root may be the same directory.
        let same_file = match (fs::canonicalize(path).await, fs::canonicalize(&dest).await) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_file {
            fs::copy(path, &dest).await?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(anyhow::anyhow!("{} not found", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        Ok(fs::try_exists(self.path_for(key)).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }

    fn local_path(&self, key: &str) -> Option<PathBuf> {
        Some(self.path_for(key))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let meta = fs::metadata(&self.base_path).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(AppError::StorageError(anyhow::anyhow!(
                "{} is not a directory",
                self.base_path.display()
            )))
        }
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, public_base_url: Option<String>) -> Self {
        let public_base_url = public_base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket));
        Self {
            client,
            bucket,
            public_base_url,
        }
    }

    /// Credentials come from the standard AWS environment chain.
    pub async fn from_env(bucket: String, region: String, public_base_url: Option<String>) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;
        Self::new(S3Client::new(&sdk_config), bucket, public_base_url)
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), AppError> {
        let body = ByteStream::from_path(path).await.map_err(|e| {
            AppError::StorageError(anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 upload failed: {}", e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    AppError::NotFound(anyhow::anyhow!("{} not found", key))
                } else {
                    AppError::StorageError(anyhow::anyhow!("S3 download failed: {}", e))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 body collection failed: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(AppError::StorageError(anyhow::anyhow!(
                "S3 head failed: {}",
                e.code().unwrap_or("unknown")
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 delete failed: {}", e)))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> Option<String> {
        Some(format!("{}/{}", self.public_base_url, key))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 bucket check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_put_get_delete() {
        let root = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path().join("assets")).await.unwrap();

        let src = work.path().join("x.mp4");
        tokio::fs::write(&src, b"video").await.unwrap();

        assert!(!storage.exists("x.mp4").await.unwrap());
        storage.put_file("x.mp4", &src, "video/mp4").await.unwrap();
        assert!(storage.exists("x.mp4").await.unwrap());
        assert_eq!(storage.get("x.mp4").await.unwrap(), b"video");

        storage.delete("x.mp4").await.unwrap();
        assert!(!storage.exists("x.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn local_put_in_place_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path()).await.unwrap();
        let src = storage.path_for("y.jpg");
        tokio::fs::write(&src, b"jpeg").await.unwrap();

        storage.put_file("y.jpg", &src, "image/jpeg").await.unwrap();
        assert_eq!(storage.get("y.jpg").await.unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn local_missing_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path()).await.unwrap();
        assert!(matches!(
            storage.get("nope.webm").await,
            Err(AppError::NotFound(_))
        ));
        assert!(storage.public_url("nope.webm").is_none());
        storage.health_check().await.unwrap();
    }

    #[test]
    fn s3_public_url_defaults_to_bucket_host() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let client = S3Client::from_conf(config);

        let storage = S3Storage::new(client.clone(), "gifs".to_string(), None);
        assert_eq!(
            storage.public_url("a.mp4").as_deref(),
            Some("https://gifs.s3.amazonaws.com/a.mp4")
        );

        let storage = S3Storage::new(client, "gifs".to_string(), Some("https://cdn.example.com/".to_string()));
        assert_eq!(
            storage.public_url("a.mp4").as_deref(),
            Some("https://cdn.example.com/a.mp4")
        );
    }
}
