//! Payment endpoints: bulk update and month deletion

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tuition_common::ledger::{BulkUpdateOutcome, PaymentSubmission};
use tuition_common::Month;

use super::MutationResponse;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    /// Student name to submitted status and amount text
    #[serde(default)]
    pub entries: HashMap<String, PaymentSubmission>,
}

#[derive(Debug, Serialize)]
pub struct DeleteDetail {
    pub removed: u64,
}

fn parse_month(text: &str) -> ApiResult<Month> {
    text.parse::<Month>()
        .map_err(|_| ApiError::BadRequest(format!("month must be YYYY-MM, got '{}'", text)))
}

/// POST /api/payments/:month
///
/// **Request:** `{"entries": {"Avi": {"status": "partially_paid", "paid_amount": "150"}}}`
///
/// Students without a status keep their row. Names outside the month's
/// display set are reported under `ignored` and not written.
///
/// **Errors:**
/// - 400 Bad Request: malformed month or unknown status (nothing is written)
pub async fn update_payments(
    State(state): State<AppState>,
    Path(month): Path<String>,
    payload: Result<Json<BulkUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<MutationResponse<BulkUpdateOutcome>>> {
    let month = parse_month(&month)?;
    let Json(payload) = payload?;
    let outcome = state
        .ledger
        .apply_bulk_update(month, &payload.entries)
        .await?;

    if outcome.written > 0 {
        state.sync.request(&format!("payments updated for {}", month));
    }

    Ok(Json(MutationResponse::ok(
        format!("Saved {} payments for {}", outcome.written, month.label()),
        outcome,
    )))
}

/// DELETE /api/payments/:month
///
/// Idempotent; deleting a month with no rows succeeds with `removed: 0`.
pub async fn delete_month(
    State(state): State<AppState>,
    Path(month): Path<String>,
) -> ApiResult<Json<MutationResponse<DeleteDetail>>> {
    let month = parse_month(&month)?;
    let removed = state.ledger.delete_month(month).await?;

    if removed > 0 {
        state.sync.request(&format!("month {} deleted", month));
    }

    Ok(Json(MutationResponse::ok(
        format!("Deleted {} payments for {}", removed, month.label()),
        DeleteDetail { removed },
    )))
}
