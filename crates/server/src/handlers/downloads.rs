//! Download URL handlers.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use stow_core::api::{BatchDownloadRequest, BatchDownloadResponse};

/// POST /v1/downloads - Presign download URLs for completed sessions.
pub async fn batch_download_urls(
    State(state): State<AppState>,
    Json(req): Json<BatchDownloadRequest>,
) -> ApiResult<Json<BatchDownloadResponse>> {
    Ok(Json(state.sessions.batch_download_urls(req).await?))
}
