//! Payment ledger
//!
//! Pure reconciliation and report logic lives here; [`Ledger`] in
//! `service.rs` wires it to the database and roster file.
//!
//! Status and amount are coupled at read and write time:
//! - `Paid` forces `paid_amount = monthly_fee`, `remaining = 0`
//! - `Unpaid` forces `paid_amount = 0`, `remaining = monthly_fee`
//! - `PartiallyPaid` keeps the stored amount, `remaining = monthly_fee - paid_amount`
//!
//! The fee is never historized: reports always use the current fee.

mod service;

pub use service::{BulkUpdateOutcome, Ledger, LedgerOptions, MonthView, PaymentSubmission};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Month, Result};

/// Payment status of one student for one month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    PartiallyPaid,
    Unpaid,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [
        PaymentStatus::Paid,
        PaymentStatus::PartiallyPaid,
        PaymentStatus::Unpaid,
    ];

    /// Storage / wire form
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "paid" => Ok(PaymentStatus::Paid),
            "partially_paid" => Ok(PaymentStatus::PartiallyPaid),
            "unpaid" => Ok(PaymentStatus::Unpaid),
            other => Err(Error::InvalidInput(format!(
                "unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// How a negative remainder (overpayment) is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemainingPolicy {
    /// Remaining never drops below zero
    #[default]
    Clamp,
    /// Remaining may go negative when more than the fee was paid
    Signed,
}

/// The single global settings record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub monthly_fee: i64,
    pub report_email: Option<String>,
}

/// A payment row as stored for one (month, student) key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPayment {
    pub status: PaymentStatus,
    pub paid_amount: i64,
}

impl Default for StoredPayment {
    fn default() -> Self {
        Self {
            status: PaymentStatus::Unpaid,
            paid_amount: 0,
        }
    }
}

/// One line of a month report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub status: PaymentStatus,
    pub paid_amount: i64,
    pub remaining: i64,
    pub fee: i64,
}

/// Report for one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthReport {
    pub month: Month,
    pub entries: Vec<ReportEntry>,
    pub total_paid: i64,
}

/// Largest accepted fee or paid amount. Far below `i64::MAX` so report
/// totals over any realistic roster cannot overflow.
pub const MAX_AMOUNT: i64 = 1_000_000_000;

/// Students shown for a month: the roster unioned with everyone who has a
/// payment row for that month, deduplicated and sorted by name.
pub fn reconcile<'a, I>(roster: &'a [String], with_rows: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: BTreeSet<&str> = roster.iter().map(String::as_str).collect();
    names.extend(with_rows);
    names.into_iter().map(str::to_owned).collect()
}

/// Apply the status/amount coupling against the current fee.
///
/// Returns `(paid_amount, remaining)`.
pub fn normalize(payment: StoredPayment, fee: i64, policy: RemainingPolicy) -> (i64, i64) {
    match payment.status {
        PaymentStatus::Paid => (fee, 0),
        PaymentStatus::Unpaid => (0, fee),
        PaymentStatus::PartiallyPaid => {
            let paid = payment.paid_amount.max(0);
            let remaining = fee - paid;
            match policy {
                RemainingPolicy::Clamp => (paid, remaining.max(0)),
                RemainingPolicy::Signed => (paid, remaining),
            }
        }
    }
}

/// Build the report for `month` over exactly the `display` set.
///
/// Students without a row default to Unpaid with nothing paid.
pub fn compute_report(
    month: Month,
    display: &[String],
    rows: &HashMap<String, StoredPayment>,
    fee: i64,
    policy: RemainingPolicy,
) -> MonthReport {
    let mut total_paid: i64 = 0;
    let entries = display
        .iter()
        .map(|name| {
            let payment = rows.get(name).copied().unwrap_or_default();
            let (paid_amount, remaining) = normalize(payment, fee, policy);
            // Rows written by other tools may exceed MAX_AMOUNT
            total_paid = total_paid.saturating_add(paid_amount);
            ReportEntry {
                name: name.clone(),
                status: payment.status,
                paid_amount,
                remaining,
                fee,
            }
        })
        .collect();

    MonthReport {
        month,
        entries,
        total_paid,
    }
}

/// Parse a submitted paid amount; anything malformed, negative or above
/// [`MAX_AMOUNT`] is 0
pub fn parse_paid_amount(text: &str) -> i64 {
    text.trim()
        .parse::<i64>()
        .ok()
        .filter(|v| (0..=MAX_AMOUNT).contains(v))
        .unwrap_or(0)
}

/// Parse a submitted monthly fee; must be a positive integer
pub fn parse_monthly_fee(text: &str) -> Result<i64> {
    let fee = text
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidInput(format!("monthly fee must be an integer, got '{}'", text.trim())))?;
    if fee <= 0 {
        return Err(Error::InvalidInput(format!(
            "monthly fee must be positive, got {}",
            fee
        )));
    }
    if fee > MAX_AMOUNT {
        return Err(Error::InvalidInput(format!(
            "monthly fee must not exceed {}, got {}",
            MAX_AMOUNT, fee
        )));
    }
    Ok(fee)
}

/// Row to store for one submitted (status, amount text) pair
pub fn coerce_submission(status: PaymentStatus, paid_amount_text: &str, fee: i64) -> StoredPayment {
    let paid_amount = match status {
        PaymentStatus::Paid => fee,
        PaymentStatus::Unpaid => 0,
        PaymentStatus::PartiallyPaid => parse_paid_amount(paid_amount_text),
    };
    StoredPayment {
        status,
        paid_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month() -> Month {
        "2024-05".parse().unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn row(status: PaymentStatus, paid_amount: i64) -> StoredPayment {
        StoredPayment {
            status,
            paid_amount,
        }
    }

    #[test]
    fn test_reconcile_unions_and_sorts() {
        let roster = names(&["Dana", "Avi", "Ben"]);
        let display = reconcile(&roster, ["Zoe", "Avi"]);
        assert_eq!(display, names(&["Avi", "Ben", "Dana", "Zoe"]));
    }

    #[test]
    fn test_missing_row_defaults_to_unpaid() {
        let report = compute_report(month(), &names(&["Avi"]), &HashMap::new(), 330, RemainingPolicy::Clamp);
        assert_eq!(
            report.entries[0],
            ReportEntry {
                name: "Avi".into(),
                status: PaymentStatus::Unpaid,
                paid_amount: 0,
                remaining: 330,
                fee: 330,
            }
        );
        assert_eq!(report.total_paid, 0);
    }

    #[test]
    fn test_coupling_overrides_stored_amounts() {
        // Stored amounts disagree with status; status wins
        let paid = normalize(row(PaymentStatus::Paid, 12), 330, RemainingPolicy::Clamp);
        assert_eq!(paid, (330, 0));
        let unpaid = normalize(row(PaymentStatus::Unpaid, 200), 330, RemainingPolicy::Clamp);
        assert_eq!(unpaid, (0, 330));
    }

    #[test]
    fn test_partial_payment_uses_live_fee() {
        let mut rows = HashMap::new();
        rows.insert("Avi".to_string(), row(PaymentStatus::PartiallyPaid, 150));
        let display = names(&["Avi"]);

        let report = compute_report(month(), &display, &rows, 330, RemainingPolicy::Clamp);
        let e = &report.entries[0];
        assert_eq!((e.status, e.paid_amount, e.remaining, e.fee), (PaymentStatus::PartiallyPaid, 150, 180, 330));

        let report = compute_report(month(), &display, &rows, 400, RemainingPolicy::Clamp);
        assert_eq!(report.entries[0].remaining, 250);
    }

    #[test]
    fn test_overpayment_policy() {
        let over = row(PaymentStatus::PartiallyPaid, 500);
        assert_eq!(normalize(over, 330, RemainingPolicy::Clamp), (500, 0));
        assert_eq!(normalize(over, 330, RemainingPolicy::Signed), (500, -170));
    }

    #[test]
    fn test_total_paid_sums_display_set() {
        let mut rows = HashMap::new();
        rows.insert("Avi".to_string(), row(PaymentStatus::PartiallyPaid, 150));
        rows.insert("Ben".to_string(), row(PaymentStatus::Paid, 0));
        // Row outside the display set must not count
        rows.insert("Gone".to_string(), row(PaymentStatus::Paid, 330));

        let display = names(&["Avi", "Ben", "Dana"]);
        let report = compute_report(month(), &display, &rows, 330, RemainingPolicy::Clamp);

        assert_eq!(report.entries.len(), 3);
        let sum: i64 = report.entries.iter().map(|e| e.paid_amount).sum();
        assert_eq!(report.total_paid, sum);
        assert_eq!(report.total_paid, 480);
    }

    #[test]
    fn test_paid_submission_ignores_amount_text() {
        let stored = coerce_submission(PaymentStatus::Paid, "999", 330);
        assert_eq!(stored, row(PaymentStatus::Paid, 330));
    }

    #[test]
    fn test_partial_submission_with_garbage_amount() {
        let stored = coerce_submission(PaymentStatus::PartiallyPaid, "abc", 330);
        assert_eq!(stored, row(PaymentStatus::PartiallyPaid, 0));
        assert_eq!(normalize(stored, 330, RemainingPolicy::Clamp), (0, 330));
    }

    #[test]
    fn test_partial_submission_keeps_amount() {
        let stored = coerce_submission(PaymentStatus::PartiallyPaid, " 120 ", 330);
        assert_eq!(stored.paid_amount, 120);
    }

    #[test]
    fn test_parse_paid_amount_coercions() {
        assert_eq!(parse_paid_amount("42"), 42);
        assert_eq!(parse_paid_amount(""), 0);
        assert_eq!(parse_paid_amount("-5"), 0);
        assert_eq!(parse_paid_amount("12.5"), 0);
        assert_eq!(parse_paid_amount("1000000000"), MAX_AMOUNT);
        assert_eq!(parse_paid_amount("1000000001"), 0);
        assert_eq!(parse_paid_amount("9223372036854775807"), 0);
        assert_eq!(parse_paid_amount("99999999999999999999"), 0);
    }

    #[test]
    fn test_huge_amounts_do_not_overflow_total() {
        assert!(matches!(
            parse_monthly_fee("9223372036854775807"),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(parse_monthly_fee("1000000000").unwrap(), MAX_AMOUNT);

        // Partial amount beyond the limit is coerced, so the total stays small
        let stored = coerce_submission(PaymentStatus::PartiallyPaid, "9223372036854775807", 330);
        assert_eq!(stored.paid_amount, 0);

        // Stored rows that bypassed parsing saturate instead of panicking
        let mut rows = HashMap::new();
        rows.insert("Avi".to_string(), row(PaymentStatus::PartiallyPaid, i64::MAX));
        rows.insert("Ben".to_string(), row(PaymentStatus::PartiallyPaid, 1));
        let report = compute_report(month(), &names(&["Avi", "Ben"]), &rows, 330, RemainingPolicy::Clamp);
        assert_eq!(report.total_paid, i64::MAX);
        assert_eq!(report.entries[0].remaining, 0);
    }

    #[test]
    fn test_parse_monthly_fee() {
        assert_eq!(parse_monthly_fee(" 400 ").unwrap(), 400);
        assert!(matches!(parse_monthly_fee("0"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_monthly_fee("-10"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_monthly_fee("lots"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_status_round_trips_through_storage_form() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("settled".parse::<PaymentStatus>().is_err());
    }
}
