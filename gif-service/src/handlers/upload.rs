use crate::dtos::{UploadParams, UploadResult};
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

/// `GET|POST /upload?u=<gif url>`
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
) -> Result<Json<UploadResult>, AppError> {
    let gif_url = params
        .u
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("please specify a file to download")))?;

    tracing::info!(url = %gif_url, "Upload requested");

    let result = state.pipeline.process(gif_url.trim()).await?;

    tracing::info!(
        url = %gif_url,
        width = result.width,
        height = result.height,
        "Upload completed"
    );

    Ok(Json(result))
}
