//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (unauthenticated, for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        // Session control plane
        .route("/v1/sessions", post(handlers::create_session))
        .route("/v1/sessions/{session_id}", get(handlers::get_session))
        .route("/v1/sessions/{session_id}/parts", post(handlers::mark_part))
        .route(
            "/v1/sessions/{session_id}/complete",
            post(handlers::complete_session),
        )
        .route("/v1/sessions/{session_id}/fail", post(handlers::fail_session))
        .route(
            "/v1/sessions/{session_id}/cancel",
            post(handlers::cancel_session),
        )
        // Tenant limits
        .route(
            "/v1/tenants/{tenant_id}/rate-limit",
            get(handlers::get_rate_limit),
        )
        // Downloads
        .route("/v1/downloads", post(handlers::batch_download_urls))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
