//! Database initialization
//!
//! Creates the database on first run, applies the schema idempotently and
//! makes sure the single settings row exists.

use crate::ledger::Settings;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the ledger database and apply the schema
pub async fn init_database(db_path: &Path, defaults: &Settings) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets report reads proceed while a bulk update commits
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool, defaults).await?;

    Ok(pool)
}

/// Create tables and seed default settings (idempotent)
pub async fn init_schema(pool: &SqlitePool, defaults: &Settings) -> Result<()> {
    create_settings_table(pool).await?;
    create_payments_table(pool).await?;
    init_default_settings(pool, defaults).await?;
    Ok(())
}

/// Create the settings table
///
/// Holds exactly one row (id = 1).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            monthly_fee INTEGER NOT NULL CHECK (monthly_fee > 0),
            report_email TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the payments table
///
/// One row per (month, student). Months are stored as `YYYY-MM`.
pub async fn create_payments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            month TEXT NOT NULL,
            student_name TEXT NOT NULL,
            status TEXT NOT NULL,
            paid_amount INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (month, student_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert the settings row if it does not exist yet
async fn init_default_settings(pool: &SqlitePool, defaults: &Settings) -> Result<()> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO settings (id, monthly_fee, report_email) VALUES (1, ?, ?)",
    )
    .bind(defaults.monthly_fee)
    .bind(defaults.report_email.as_deref())
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        info!(
            monthly_fee = defaults.monthly_fee,
            "Seeded default settings"
        );
    }

    Ok(())
}
