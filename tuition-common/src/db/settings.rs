//! Settings row accessors

use sqlx::SqlitePool;

use crate::ledger::Settings;
use crate::{Error, Result};

/// Load the settings row
pub async fn load_settings(db: &SqlitePool) -> Result<Settings> {
    let row: Option<(i64, Option<String>)> =
        sqlx::query_as("SELECT monthly_fee, report_email FROM settings WHERE id = 1")
            .fetch_optional(db)
            .await?;

    match row {
        Some((monthly_fee, report_email)) => Ok(Settings {
            monthly_fee,
            report_email,
        }),
        None => Err(Error::NotFound("settings row".to_string())),
    }
}

/// Replace fee and email in one statement
pub async fn store_settings(db: &SqlitePool, settings: &Settings) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE settings
         SET monthly_fee = ?, report_email = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = 1",
    )
    .bind(settings.monthly_fee)
    .bind(settings.report_email.as_deref())
    .execute(db)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound("settings row".to_string()));
    }
    Ok(())
}
