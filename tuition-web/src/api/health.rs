//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub sync: SyncSummary,
}

/// Replication state without timestamps
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    pub enabled: bool,
    pub pending: u64,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
}

/// GET /health
///
/// Does not require authentication. Reports "degraded" while publishes to
/// the remote keep failing; the ledger itself still works.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let sync = state.sync.status().await;
    let status = if sync.consecutive_failures > 0 {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "tuition-web".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sync: SyncSummary {
            enabled: sync.enabled,
            pending: sync.pending,
            consecutive_failures: sync.consecutive_failures,
            last_error: sync.last_error,
        },
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
