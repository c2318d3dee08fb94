use crate::naming::OutputFormat;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct GifConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    /// Base URL that stored objects are publicly readable under. When unset
    /// for the S3 backend the virtual-hosted bucket URL is used.
    pub s3_public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    pub ffmpeg_path: String,
    pub convert_path: String,
    pub command_timeout_secs: u64,
}

impl ToolsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub work_dir: String,
    /// Prefix of the URLs reported in upload results, e.g. `http://gifs.example.com`.
    pub public_base_url: String,
    pub preview_format: PreviewFormat,
    pub download_timeout_secs: u64,
    pub cleanup_work_files: bool,
}

impl PipelineConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFormat {
    Jpg,
    Png,
}

impl PreviewFormat {
    pub fn output_format(self) -> OutputFormat {
        match self {
            PreviewFormat::Jpg => OutputFormat::Jpg,
            PreviewFormat::Png => OutputFormat::Png,
        }
    }
}

impl GifConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let storage = StorageConfig {
            backend: get_env("STORAGE_BACKEND", Some("local"), is_prod)?
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), false)?,
            s3_bucket: env::var("S3_BUCKET_NAME").ok().filter(|b| !b.is_empty()),
            s3_region: get_env("S3_REGION", Some("us-east-1"), false)?,
            s3_public_url: env::var("S3_PUBLIC_URL").ok().filter(|u| !u.is_empty()),
        };

        if storage.backend == StorageBackend::S3 && storage.s3_bucket.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "S3_BUCKET_NAME is required when STORAGE_BACKEND=s3"
            )));
        }

        let default_base_url = format!("http://localhost:{}", common_config.port);

        Ok(GifConfig {
            storage,
            tools: ToolsConfig {
                ffmpeg_path: get_env("FFMPEG_PATH", Some("ffmpeg"), false)?,
                convert_path: get_env("CONVERT_PATH", Some("convert"), false)?,
                command_timeout_secs: parse_env("COMMAND_TIMEOUT_SECS", 120)?,
            },
            pipeline: PipelineConfig {
                work_dir: get_env("WORK_DIR", Some("work"), false)?,
                public_base_url: get_env("PUBLIC_BASE_URL", Some(&default_base_url), is_prod)?,
                preview_format: get_env("PREVIEW_FORMAT", Some("jpg"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                download_timeout_secs: parse_env("DOWNLOAD_TIMEOUT_SECS", 30)?,
                cleanup_work_files: parse_env("CLEANUP_WORK_FILES", true)?,
            },
            common: common_config,
        })
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl std::str::FromStr for PreviewFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(PreviewFormat::Jpg),
            "png" => Ok(PreviewFormat::Png),
            _ => Err(format!("Invalid preview format: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
        }),
        Err(_) => Ok(default),
    }
}
