//! Liveness handler.

use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,

    /// Active token validation strategy.
    pub validation_method: String,
}

/// Health check handler.
///
/// Does not contact the identity provider; an IdP outage surfaces as 401s
/// on protected routes, not as a failed liveness probe.
#[instrument(skip_all, name = "auth.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        validation_method: state.validator.selection().to_string(),
    })
}
