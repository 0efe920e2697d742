use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::PassReport;
use crate::service::MonitorService;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<MonitorService>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn index() -> &'static str {
    "Watchbell is running"
}

// ============================================================================
// Trigger
// ============================================================================

#[derive(Serialize)]
pub struct TriggerResponse {
    pub message: &'static str,
    pub report: PassReport,
}

/// Run one evaluation pass and wait for it to finish
pub async fn trigger(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TriggerResponse>, ApiError> {
    tracing::info!("Trigger received via HTTP");

    let report = state
        .service
        .run_once()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(TriggerResponse {
        message: "Checks completed",
        report,
    }))
}

// ============================================================================
// Watchers
// ============================================================================

#[derive(Serialize)]
pub struct WatchersResponse {
    pub watchers: Vec<String>,
}

/// Ids of the watchers the next pass will evaluate
pub async fn list_watchers(State(state): State<Arc<AppState>>) -> Json<WatchersResponse> {
    let watchers = state
        .service
        .orchestrator()
        .watchers()
        .iter()
        .map(|w| w.id().to_string())
        .collect();

    Json(WatchersResponse { watchers })
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
