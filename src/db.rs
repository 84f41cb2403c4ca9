use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{GazemapError, GazemapResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS content_fingerprints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    analysis_id TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (owner_id, content_hash)
);

CREATE TABLE IF NOT EXISTS layer_artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    analysis_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    storage_key TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    byte_size INTEGER NOT NULL,
    mime_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (analysis_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_layer_artifacts_analysis
    ON layer_artifacts (analysis_id);
";

/// Open (creating if missing) the metadata database and apply the schema.
pub async fn connect(db_path: &Path) -> GazemapResult<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            GazemapError::storage(format!(
                "create database directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(|err| GazemapError::storage(format!("invalid database path: {err}")))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> GazemapResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

pub(crate) fn to_i64(value: u64) -> GazemapResult<i64> {
    i64::try_from(value)
        .map_err(|_| GazemapError::storage(format!("value {value} exceeds SQLite INTEGER range")))
}

pub(crate) fn to_u64(value: i64) -> GazemapResult<u64> {
    u64::try_from(value)
        .map_err(|_| GazemapError::storage(format!("value {value} is negative")))
}

pub(crate) fn parse_datetime(value: &str) -> GazemapResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| GazemapError::storage(format!("invalid datetime '{value}': {err}")))
}
