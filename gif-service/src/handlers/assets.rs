use crate::dtos::FetchParams;
use crate::naming::{parse_asset_key, OutputFormat};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use service_core::error::AppError;

/// `GET /{asset}`: redirect to the public copy, or stream it from storage.
pub async fn get_asset(
    State(state): State<AppState>,
    Path(asset): Path<String>,
) -> Result<Response, AppError> {
    let (_, format) = parse_asset_key(&asset)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("{} not found", asset)))?;

    serve(&state, &asset, format).await
}

/// `GET /fetch?u=<gif url>&t=<ext>`: converts on demand, then serves.
pub async fn fetch_asset(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> Result<Response, AppError> {
    let gif_url = params
        .u
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("please specify a file to download")))?;

    let format = params
        .t
        .as_deref()
        .and_then(OutputFormat::from_extension)
        .filter(|f| state.pipeline.supports(*f))
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "unsupported type {:?}",
                params.t.as_deref().unwrap_or("")
            ))
        })?;

    let key = state.pipeline.ensure(gif_url.trim(), format).await?;

    serve(&state, &key, format).await
}

async fn serve(state: &AppState, key: &str, format: OutputFormat) -> Result<Response, AppError> {
    let storage = state.pipeline.storage();

    if let Some(url) = storage.public_url(key) {
        tracing::debug!(key = %key, location = %url, "Redirecting to public asset");
        return Ok(Redirect::temporary(&url).into_response());
    }

    let data = storage.get(key).await.map_err(|e| {
        if !matches!(e, AppError::NotFound(_)) {
            tracing::error!(key = %key, error = %e, "Failed to read asset");
        }
        e
    })?;

    tracing::info!(
        key = %key,
        content_type = format.content_type(),
        size = data.len(),
        "Serving asset"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type()),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        data,
    )
        .into_response())
}
