//! Table definitions and in-place upgrades

use sqlx::SqliteConnection;

use crate::Result;

pub(crate) const TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS structured_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        event TEXT NOT NULL,
        level TEXT NOT NULL,
        agent TEXT,
        source TEXT,
        session TEXT,
        duration_ms INTEGER,
        error TEXT,
        data_json TEXT,
        ingested_at TEXT NOT NULL,
        source_file TEXT,
        entry_hash TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS raw_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT,
        source TEXT NOT NULL,
        level TEXT,
        message TEXT,
        raw_line TEXT,
        source_file TEXT,
        ingested_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ingest_state (
        file_path TEXT PRIMARY KEY,
        last_byte_offset INTEGER NOT NULL DEFAULT 0,
        last_ingested_at TEXT NOT NULL,
        fingerprint TEXT
    )"#,
];

/// Columns added after the first schema, with their SQL types.
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("structured_logs", "source_file", "TEXT"),
    ("structured_logs", "entry_hash", "TEXT"),
    ("raw_logs", "source_file", "TEXT"),
    ("ingest_state", "fingerprint", "TEXT"),
];

pub(crate) const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_logs_ts ON structured_logs(ts)",
    "CREATE INDEX IF NOT EXISTS idx_logs_event ON structured_logs(event)",
    "CREATE INDEX IF NOT EXISTS idx_logs_level ON structured_logs(level)",
    "CREATE INDEX IF NOT EXISTS idx_logs_agent ON structured_logs(agent)",
    "CREATE INDEX IF NOT EXISTS idx_logs_event_ts ON structured_logs(event, ts)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_logs_entry_hash ON structured_logs(entry_hash)",
    "CREATE INDEX IF NOT EXISTS idx_raw_ts ON raw_logs(ts)",
    "CREATE INDEX IF NOT EXISTS idx_raw_source ON raw_logs(source)",
];

/// Create missing tables, add missing columns, then create indexes.
///
/// Safe to run on every open. SQLite has no `ADD COLUMN IF NOT EXISTS`, so
/// existing columns are read from `pragma_table_info` first.
pub(crate) async fn initialize(conn: &mut SqliteConnection) -> Result<()> {
    for statement in TABLES {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    for (table, column, sql_type) in ADDED_COLUMNS {
        let existing: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
                .bind(*table)
                .fetch_all(&mut *conn)
                .await?;

        if !existing.iter().any(|c| c == column) {
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}"))
                .execute(&mut *conn)
                .await?;
        }
    }

    for statement in INDEXES {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    Ok(())
}
