#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use gif_service::config::{
    GifConfig, PipelineConfig, PreviewFormat, StorageBackend, StorageConfig, ToolsConfig,
};
use gif_service::startup::Application;
use image::codecs::gif::GifEncoder;
use image::{Frame, RgbaImage};
use service_core::config::Config as CoreConfig;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const FIXTURE_WIDTH: u32 = 7;
pub const FIXTURE_HEIGHT: u32 = 3;
pub const PUBLIC_BASE_URL: &str = "http://gifs.test";

/// Stand-ins for ffmpeg and convert: write a marker into the last argument
/// and log the call next to it.
const STUB_TOOL: &str = r#"#!/bin/sh
for last; do :; done
printf 'converted by %s' "$(basename "$0")" > "$last"
echo "$(basename "$0") $*" >> "$(dirname "$last")/calls.log"
"#;

/// An ffmpeg that writes part of its output, then fails.
const BROKEN_TOOL: &str = r#"#!/bin/sh
for last; do :; done
printf 'TRUNC' > "$last"
echo "$(basename "$0") $*" >> "$(dirname "$last")/calls.log"
echo 'Conversion failed!' >&2
exit 1
"#;

static STUB_DIR: OnceLock<TempDir> = OnceLock::new();

/// Written once per test binary, before anything is spawned, so no
/// concurrently forked child can hold the scripts open for writing.
fn stub_tools() -> &'static Path {
    STUB_DIR
        .get_or_init(|| {
            use std::os::unix::fs::PermissionsExt;

            let dir = tempfile::tempdir().expect("Failed to create stub dir");
            for (name, script) in [
                ("ffmpeg", STUB_TOOL),
                ("convert", STUB_TOOL),
                ("broken-ffmpeg", BROKEN_TOOL),
            ] {
                let path = dir.path().join(name);
                std::fs::write(&path, script).expect("Failed to write stub tool");
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                    .expect("Failed to chmod stub tool");
            }
            dir
        })
        .path()
}

pub fn fixture_gif() -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder
            .encode_frame(Frame::new(RgbaImage::new(FIXTURE_WIDTH, FIXTURE_HEIGHT)))
            .expect("Failed to encode fixture");
    }
    bytes
}

/// Serves the fixture GIF (and a few failure cases) and counts downloads.
pub struct FixtureServer {
    pub base_url: String,
    pub gif_hits: Arc<AtomicUsize>,
}

impl FixtureServer {
    pub async fn spawn() -> Self {
        let gif_hits = Arc::new(AtomicUsize::new(0));

        async fn cat_gif(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
            hits.fetch_add(1, Ordering::SeqCst);
            ([(header::CONTENT_TYPE, "image/gif")], fixture_gif())
        }

        let app = Router::new()
            .route("/cat.gif", get(cat_gif))
            .route(
                "/page.html",
                get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
            )
            .route(
                "/corrupt.gif",
                get(|| async { ([(header::CONTENT_TYPE, "image/gif")], "GIF89a-nope") }),
            )
            .route("/missing.gif", get(|| async { StatusCode::NOT_FOUND }))
            .with_state(gif_hits.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fixture server");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { base_url, gif_hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn gif_hits(&self) -> usize {
        self.gif_hits.load(Ordering::SeqCst)
    }
}

pub struct TestOptions {
    pub preview: PreviewFormat,
    pub cleanup: bool,
    pub broken_ffmpeg: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            preview: PreviewFormat::Jpg,
            cleanup: true,
            broken_ffmpeg: false,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub storage_path: PathBuf,
    pub work_path: PathBuf,
    pub fixtures: FixtureServer,
    pub client: reqwest::Client,
    _root: TempDir,
}

pub fn test_config(root: &Path, options: &TestOptions) -> GifConfig {
    let tools = stub_tools();
    let ffmpeg = if options.broken_ffmpeg {
        "broken-ffmpeg"
    } else {
        "ffmpeg"
    };
    GifConfig {
        common: CoreConfig { port: 0 },
        storage: StorageConfig {
            backend: StorageBackend::Local,
            local_path: root.join("storage").to_string_lossy().into_owned(),
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_public_url: None,
        },
        tools: ToolsConfig {
            ffmpeg_path: tools.join(ffmpeg).to_string_lossy().into_owned(),
            convert_path: tools.join("convert").to_string_lossy().into_owned(),
            command_timeout_secs: 10,
        },
        pipeline: PipelineConfig {
            work_dir: root.join("work").to_string_lossy().into_owned(),
            public_base_url: PUBLIC_BASE_URL.to_string(),
            preview_format: options.preview,
            download_timeout_secs: 5,
            cleanup_work_files: options.cleanup,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        let root = tempfile::tempdir().expect("Failed to create test root");
        let config = test_config(root.path(), &options);

        let app = Application::build(config.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let fixtures = FixtureServer::spawn().await;

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("http://127.0.0.1:{}/health", port);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            storage_path: PathBuf::from(config.storage.local_path),
            work_path: PathBuf::from(config.pipeline.work_dir),
            fixtures,
            client,
            _root: root,
        }
    }

    pub async fn upload(&self, gif_url: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/upload", self.address))
            .query(&[("u", gif_url)])
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Lines in the stub tools' call log for this app's work dir.
    pub fn tool_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.work_path.join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn stored(&self, key: &str) -> bool {
        self.storage_path.join(key).is_file()
    }
}
