//! Moving old rows into per-month archive databases

use std::path::{Path, PathBuf};

use evlog_core::timestamp;
use sqlx::{Connection, SqliteConnection};
use time::OffsetDateTime;
use tracing::info;

use crate::db::IndexedStore;
use crate::Result;

const COPY_MONTH: &str = r#"
    INSERT OR IGNORE INTO archive.structured_logs
    (ts, event, level, agent, source, session, duration_ms, error, data_json, ingested_at, source_file, entry_hash)
    SELECT ts, event, level, agent, source, session, duration_ms, error, data_json, ingested_at, source_file, entry_hash
    FROM main.structured_logs
    WHERE ts < ? AND substr(ts, 1, 7) = ?
"#;

const DELETE_MONTH: &str =
    "DELETE FROM main.structured_logs WHERE ts < ? AND substr(ts, 1, 7) = ?";

/// Rows moved into one archive database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMonth {
    pub month: String,
    pub path: PathBuf,
    pub rows: u64,
}

impl IndexedStore {
    /// Move `structured_logs` rows older than `cutoff` into one database
    /// per month of their timestamps, then `VACUUM` this store.
    ///
    /// `archive_path` maps a `YYYY-MM` key to that month's database file.
    pub async fn archive_rows_before(
        &self,
        cutoff: OffsetDateTime,
        archive_path: impl Fn(&str) -> PathBuf,
    ) -> Result<Vec<ArchivedMonth>> {
        let cutoff = timestamp::format(cutoff);

        let months: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT substr(ts, 1, 7) FROM structured_logs WHERE ts < ? ORDER BY 1",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut archived = Vec::new();
        for month in months {
            let path = archive_path(&month);

            // creates the file and its schema
            IndexedStore::open(&path).await?.close().await;

            let mut conn = self.pool.acquire().await?;
            sqlx::query("ATTACH DATABASE ? AS archive")
                .bind(path.to_string_lossy().into_owned())
                .execute(&mut *conn)
                .await?;

            let moved = move_month(&mut conn, &cutoff, &month).await;

            sqlx::query("DETACH DATABASE archive")
                .execute(&mut *conn)
                .await?;
            let rows = moved?;

            info!("Archived {} rows from {} into {}", rows, month, file_label(&path));
            archived.push(ArchivedMonth { month, path, rows });
        }

        if !archived.is_empty() {
            sqlx::query("VACUUM").execute(&self.pool).await?;
        }

        Ok(archived)
    }
}

async fn move_month(conn: &mut SqliteConnection, cutoff: &str, month: &str) -> Result<u64> {
    let mut tx = conn.begin().await?;

    sqlx::query(COPY_MONTH)
        .bind(cutoff)
        .bind(month)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query(DELETE_MONTH)
        .bind(cutoff)
        .bind(month)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
