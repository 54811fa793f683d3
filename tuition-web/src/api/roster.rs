//! Roster endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tuition_common::roster::render_roster_text;

use super::MutationResponse;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub students: Vec<String>,
    /// Newline-delimited form of `students`, for editing
    pub students_text: String,
}

impl RosterResponse {
    fn from_names(students: Vec<String>) -> Self {
        let students_text = render_roster_text(&students);
        Self {
            students,
            students_text,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRosterRequest {
    pub students_text: String,
}

/// GET /api/roster
pub async fn get_roster(State(state): State<AppState>) -> ApiResult<Json<RosterResponse>> {
    let students = state.ledger.roster().await?;
    Ok(Json(RosterResponse::from_names(students)))
}

/// PUT /api/roster
///
/// Replaces the whole roster. Payment rows of removed students are kept.
pub async fn replace_roster(
    State(state): State<AppState>,
    payload: Result<Json<ReplaceRosterRequest>, JsonRejection>,
) -> ApiResult<Json<MutationResponse<RosterResponse>>> {
    let Json(payload) = payload?;
    let students = state.ledger.replace_roster(&payload.students_text).await?;
    state.sync.request("roster updated");

    Ok(Json(MutationResponse::ok(
        format!("Roster saved with {} students", students.len()),
        RosterResponse::from_names(students),
    )))
}
