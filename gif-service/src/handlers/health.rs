use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness string kept from the service's first revision.
pub async fn root() -> &'static str {
    "gifs?"
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "gif-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready when the work dir is writable and storage answers.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let probe = state
        .pipeline
        .work_dir()
        .join(format!(".ready-{}", uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&probe, b"").await {
        tracing::warn!(error = %e, "Work dir is not writable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": e.to_string() })),
        );
    }
    let _ = tokio::fs::remove_file(&probe).await;

    match state.pipeline.storage().health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Storage is not reachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.to_string() })),
            )
        }
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
