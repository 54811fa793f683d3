//! Sync status endpoint

use axum::{extract::State, Json};
use tuition_common::sync::SyncStatus;

use crate::AppState;

/// GET /api/sync
pub async fn get_sync_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync.status().await)
}
