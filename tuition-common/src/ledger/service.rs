//! Ledger service over the database and roster file

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{
    coerce_submission, compute_report, parse_monthly_fee, reconcile, MonthReport, PaymentStatus,
    RemainingPolicy, Settings, StoredPayment,
};
use crate::db::{payments, settings};
use crate::month::{select_month, selectable_months};
use crate::roster::{parse_roster_text, RosterFile};
use crate::{Error, Month, Result};

/// Tunables for report computation and month derivation
#[derive(Debug, Clone, Copy)]
pub struct LedgerOptions {
    pub remaining_policy: RemainingPolicy,
    /// Months after the current one that are always selectable
    pub upcoming_months: u32,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            remaining_policy: RemainingPolicy::Clamp,
            upcoming_months: 2,
        }
    }
}

/// Everything needed to render one month
#[derive(Debug, Clone, Serialize)]
pub struct MonthView {
    pub months: Vec<Month>,
    pub selected: Month,
    pub report: MonthReport,
    pub settings: Settings,
    pub roster: Vec<String>,
}

/// One submitted line of a bulk update, as raw form text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentSubmission {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub paid_amount: Option<String>,
}

/// Result of a bulk update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkUpdateOutcome {
    pub written: usize,
    /// Displayed students with no submitted status
    pub skipped: Vec<String>,
    /// Submitted names outside the reconciled display set
    pub ignored: Vec<String>,
}

/// The payment ledger
///
/// Cheap to clone; every operation reads settings and roster fresh.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: SqlitePool,
    roster: RosterFile,
    options: LedgerOptions,
}

impl Ledger {
    pub fn new(db: SqlitePool, roster: RosterFile, options: LedgerOptions) -> Self {
        Self {
            db,
            roster,
            options,
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn roster_file(&self) -> &RosterFile {
        &self.roster
    }

    pub fn options(&self) -> LedgerOptions {
        self.options
    }

    pub async fn settings(&self) -> Result<Settings> {
        settings::load_settings(&self.db).await
    }

    /// Replace fee and report email in one write
    ///
    /// The fee must be a positive integer; nothing is written otherwise.
    /// `None` keeps the stored email; a blank email clears it.
    pub async fn update_settings(&self, fee_text: &str, report_email: Option<&str>) -> Result<Settings> {
        let monthly_fee = parse_monthly_fee(fee_text)?;
        let report_email = match report_email {
            Some(email) => Some(email.trim())
                .filter(|e| !e.is_empty())
                .map(str::to_owned),
            None => self.settings().await?.report_email,
        };

        let new_settings = Settings {
            monthly_fee,
            report_email,
        };
        settings::store_settings(&self.db, &new_settings).await?;

        info!(monthly_fee, "Settings updated");
        Ok(new_settings)
    }

    pub async fn roster(&self) -> Result<Vec<String>> {
        self.roster.load().await
    }

    /// Replace the roster from newline-delimited text
    pub async fn replace_roster(&self, text: &str) -> Result<Vec<String>> {
        let names = parse_roster_text(text);
        self.roster.save(&names).await?;
        Ok(names)
    }

    /// Selectable months relative to `today`
    pub async fn selectable_months(&self, today: Month) -> Result<Vec<Month>> {
        let stored = payments::stored_months(&self.db).await?;
        Ok(selectable_months(today, self.options.upcoming_months, stored))
    }

    /// Roster unioned with students that have rows for `month`
    pub async fn display_set(&self, month: Month) -> Result<Vec<String>> {
        let roster = self.roster.load().await?;
        let rows = payments::payments_for_month(&self.db, month).await?;
        Ok(reconcile(&roster, rows.keys().map(String::as_str)))
    }

    /// Report for one month over its reconciled display set
    pub async fn report(&self, month: Month) -> Result<MonthReport> {
        let settings = self.settings().await?;
        let roster = self.roster.load().await?;
        let rows = payments::payments_for_month(&self.db, month).await?;
        Ok(self.build_report(month, &roster, &rows, settings.monthly_fee))
    }

    fn build_report(
        &self,
        month: Month,
        roster: &[String],
        rows: &HashMap<String, StoredPayment>,
        fee: i64,
    ) -> MonthReport {
        let display = reconcile(roster, rows.keys().map(String::as_str));
        compute_report(month, &display, rows, fee, self.options.remaining_policy)
    }

    /// Month view for an optional requested month
    ///
    /// Falls back to the last selectable month when the request is missing,
    /// malformed, or not selectable.
    pub async fn month_view(&self, requested: Option<&str>, today: Month) -> Result<MonthView> {
        let months = self.selectable_months(today).await?;
        let selected = select_month(requested, &months)
            .ok_or_else(|| Error::Internal("no selectable months".to_string()))?;

        let settings = self.settings().await?;
        let roster = self.roster.load().await?;
        let rows = payments::payments_for_month(&self.db, selected).await?;
        let report = self.build_report(selected, &roster, &rows, settings.monthly_fee);

        Ok(MonthView {
            months,
            selected,
            report,
            settings,
            roster,
        })
    }

    /// Write one month's submitted statuses
    ///
    /// Covers the reconciled display set so rows can still be written for
    /// students that have left the roster. Students without a submitted
    /// status keep whatever row they had.
    pub async fn apply_bulk_update(
        &self,
        month: Month,
        submissions: &HashMap<String, PaymentSubmission>,
    ) -> Result<BulkUpdateOutcome> {
        let fee = self.settings().await?.monthly_fee;
        let display = self.display_set(month).await?;

        let mut outcome = BulkUpdateOutcome::default();
        let mut rows = Vec::with_capacity(display.len());

        for name in &display {
            let submitted = submissions.get(name);
            let status_text = submitted
                .and_then(|s| s.status.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty());

            let Some(status_text) = status_text else {
                outcome.skipped.push(name.clone());
                continue;
            };

            let status = status_text.parse::<PaymentStatus>()?;
            let amount_text = submitted
                .and_then(|s| s.paid_amount.as_deref())
                .unwrap_or("");
            rows.push((name.clone(), coerce_submission(status, amount_text, fee)));
        }

        outcome.ignored = submissions
            .keys()
            .filter(|name| display.binary_search(name).is_err())
            .cloned()
            .collect();
        outcome.ignored.sort();
        if !outcome.ignored.is_empty() {
            debug!(
                month = %month,
                ignored = ?outcome.ignored,
                "Ignoring submissions for students outside the display set"
            );
        }

        outcome.written = payments::upsert_payments(&self.db, month, &rows).await?;

        info!(
            month = %month,
            written = outcome.written,
            skipped = outcome.skipped.len(),
            "Payments updated"
        );
        Ok(outcome)
    }

    /// Delete every row for a month (idempotent)
    pub async fn delete_month(&self, month: Month) -> Result<u64> {
        let removed = payments::delete_month(&self.db, month).await?;
        info!(month = %month, removed, "Month deleted");
        Ok(removed)
    }
}
