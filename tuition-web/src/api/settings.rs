//! Settings endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tuition_common::ledger::Settings;

use super::MutationResponse;
use crate::{ApiResult, AppState};

/// Monthly fee as submitted; form clients send text, JSON clients may send a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeeInput {
    Number(i64),
    Text(String),
}

impl FeeInput {
    fn as_text(&self) -> String {
        match self {
            FeeInput::Number(n) => n.to_string(),
            FeeInput::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub monthly_fee: FeeInput,
    #[serde(default)]
    pub report_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettingsDetail {
    pub settings: Settings,
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.ledger.settings().await?))
}

/// POST /api/settings
///
/// **Request:** `{"monthly_fee": "400", "report_email": "office@example.com"}`
///
/// **Errors:**
/// - 400 Bad Request: fee not a positive integer (nothing is written)
pub async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> ApiResult<Json<MutationResponse<SettingsDetail>>> {
    let Json(payload) = payload?;
    let settings = state
        .ledger
        .update_settings(&payload.monthly_fee.as_text(), payload.report_email.as_deref())
        .await?;

    state.sync.request("settings updated");
    info!("Settings updated via API");

    Ok(Json(MutationResponse::ok(
        format!("Monthly fee set to {}", settings.monthly_fee),
        SettingsDetail { settings },
    )))
}
