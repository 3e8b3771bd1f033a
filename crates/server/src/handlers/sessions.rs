//! Session control plane handlers.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use stow_core::RateLimitSnapshot;
use stow_core::api::{
    CreateSessionRequest, CreateSessionResponse, FailSessionRequest, MarkPartRequest,
    PartProgressResponse, SessionResponse,
};

/// POST /v1/sessions - Create an upload session.
///
/// Returns 201 for a fresh session and 200 when the idempotency key
/// resolved to an existing live session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<CreateSessionResponse>)> {
    let resp = state.sessions.create(req).await?;
    let status = if resp.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resp)))
}

/// GET /v1/sessions/{session_id} - Get session state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    Ok(Json(state.sessions.get(&session_id).await?))
}

/// POST /v1/sessions/{session_id}/parts - Record an uploaded part.
pub async fn mark_part(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<MarkPartRequest>,
) -> ApiResult<Json<PartProgressResponse>> {
    Ok(Json(
        state.sessions.mark_part_uploaded(&session_id, req).await?,
    ))
}

/// POST /v1/sessions/{session_id}/complete - Confirm the upload.
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    Ok(Json(state.confirm.confirm(&session_id).await?))
}

/// POST /v1/sessions/{session_id}/fail - Fail the session with a reason.
pub async fn fail_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<FailSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    Ok(Json(state.confirm.fail(&session_id, &req.reason).await?))
}

/// POST /v1/sessions/{session_id}/cancel - Cancel the session.
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    Ok(Json(state.confirm.cancel(&session_id).await?))
}

/// GET /v1/tenants/{tenant_id}/rate-limit - Advisory rate-limit status.
pub async fn get_rate_limit(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<RateLimitSnapshot>> {
    Ok(Json(state.sessions.check_rate_limit(&tenant_id).await?))
}
