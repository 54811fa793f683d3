//! Month report endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tuition_common::ledger::MonthView;
use tuition_common::Month;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    #[serde(flatten)]
    pub view: MonthView,
    /// e.g. "May 2024"
    pub selected_label: String,
}

/// GET /api/report?month=YYYY-MM
///
/// A missing, malformed or unselectable month falls back to the last
/// selectable one.
pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<ReportResponse>> {
    let view = state
        .ledger
        .month_view(query.month.as_deref(), Month::current())
        .await?;
    let selected_label = view.selected.label();
    Ok(Json(ReportResponse {
        view,
        selected_label,
    }))
}

#[derive(Debug, Serialize)]
pub struct MonthOption {
    pub value: Month,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct MonthsResponse {
    pub months: Vec<MonthOption>,
    /// Month shown when none is requested
    pub default: Option<Month>,
}

/// GET /api/months
pub async fn get_months(State(state): State<AppState>) -> ApiResult<Json<MonthsResponse>> {
    let months = state.ledger.selectable_months(Month::current()).await?;
    let default = months.last().copied();
    Ok(Json(MonthsResponse {
        months: months
            .into_iter()
            .map(|m| MonthOption {
                value: m,
                label: m.label(),
            })
            .collect(),
        default,
    }))
}

/// POST /api/report/email
///
/// Emailing is switched off; answers 501 naming where the report would go.
pub async fn email_report(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let settings = state.ledger.settings().await?;
    let destination = settings
        .report_email
        .unwrap_or_else(|| "no configured address".to_string());
    let month = query
        .month
        .as_deref()
        .and_then(|m| m.parse::<Month>().ok())
        .map(|m| m.label())
        .unwrap_or_else(|| "the selected month".to_string());

    Err(ApiError::NotImplemented(format!(
        "Report emailing is disabled; the report for {} would be sent to {}",
        month, destination
    )))
}
