//! Payment row queries
//!
//! Rows are keyed by (month, student_name). Writes for one bulk update are
//! committed in a single transaction.

use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::warn;

use crate::ledger::{PaymentStatus, StoredPayment};
use crate::{Month, Result};

/// All rows for a month, keyed by student name
pub async fn payments_for_month(
    db: &SqlitePool,
    month: Month,
) -> Result<HashMap<String, StoredPayment>> {
    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT student_name, status, paid_amount FROM payments WHERE month = ?",
    )
    .bind(month.to_string())
    .fetch_all(db)
    .await?;

    let payments = rows
        .into_iter()
        .map(|(name, status, paid_amount)| {
            let status = status.parse::<PaymentStatus>().unwrap_or_else(|_| {
                warn!(
                    month = %month,
                    student = %name,
                    "Unknown stored status '{}', reading as unpaid",
                    status
                );
                PaymentStatus::Unpaid
            });
            (
                name,
                StoredPayment {
                    status,
                    paid_amount,
                },
            )
        })
        .collect();

    Ok(payments)
}

/// Distinct months with at least one row
///
/// Rows whose month does not parse as `YYYY-MM` are skipped with a warning.
pub async fn stored_months(db: &SqlitePool) -> Result<Vec<Month>> {
    let months: Vec<String> = sqlx::query_scalar("SELECT DISTINCT month FROM payments")
        .fetch_all(db)
        .await?;

    Ok(months
        .into_iter()
        .filter_map(|m| match m.parse::<Month>() {
            Ok(month) => Some(month),
            Err(e) => {
                warn!("Ignoring stored month: {}", e);
                None
            }
        })
        .collect())
}

/// Insert or replace the given rows for a month in one transaction
pub async fn upsert_payments(
    db: &SqlitePool,
    month: Month,
    rows: &[(String, StoredPayment)],
) -> Result<usize> {
    let month = month.to_string();
    let mut tx = db.begin().await?;

    for (name, payment) in rows {
        sqlx::query(
            "INSERT INTO payments (month, student_name, status, paid_amount)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(month, student_name) DO UPDATE SET
                 status = excluded.status,
                 paid_amount = excluded.paid_amount,
                 updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&month)
        .bind(name)
        .bind(payment.status.as_str())
        .bind(payment.paid_amount)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(rows.len())
}

/// Delete every row for a month; returns the number removed
pub async fn delete_month(db: &SqlitePool, month: Month) -> Result<u64> {
    let removed = sqlx::query("DELETE FROM payments WHERE month = ?")
        .bind(month.to_string())
        .execute(db)
        .await?
        .rows_affected();
    Ok(removed)
}

/// Number of rows stored for a month
pub async fn count_for_month(db: &SqlitePool, month: Month) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE month = ?")
        .bind(month.to_string())
        .fetch_one(db)
        .await?;
    Ok(count)
}
