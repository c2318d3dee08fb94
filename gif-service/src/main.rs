use gif_service::config::GifConfig;
use gif_service::services::init_metrics;
use gif_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics();

    // Initialize tracing (.env first so OTLP_ENDPOINT can come from it)
    dotenvy::dotenv().ok();
    let otlp_endpoint = std::env::var("OTLP_ENDPOINT")
        .ok()
        .filter(|e| !e.is_empty());
    init_tracing("gif-service", "info", otlp_endpoint.as_deref());

    let config = GifConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    tracing::info!(
        port = config.common.port,
        backend = ?config.storage.backend,
        work_dir = %config.pipeline.work_dir,
        preview = ?config.pipeline.preview_format,
        "Starting gif-service"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
