//! Health check handler.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage_backend: &'static str,
}

/// GET /v1/health - Liveness and dependency check.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state
        .metadata
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(format!("metadata store unhealthy: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok",
        storage_backend: state.storage.backend_name(),
    }))
}
