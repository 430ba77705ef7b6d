//! Database operations

use std::path::Path;

use evlog_core::{LogEntry, QueryFilter, timestamp};
use evlog_sources::RawRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::models::{IngestBatch, IngestState, RawRow, StructuredInsert, StructuredRow};
use crate::{Result, schema};

const INSERT_STRUCTURED: &str = r#"
    INSERT OR IGNORE INTO structured_logs
    (ts, event, level, agent, source, session, duration_ms, error, data_json, ingested_at, source_file, entry_hash)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_RAW: &str = r#"
    INSERT INTO raw_logs (ts, source, level, message, raw_line, source_file, ingested_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const UPSERT_STATE: &str = r#"
    INSERT INTO ingest_state (file_path, last_byte_offset, last_ingested_at, fingerprint)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(file_path) DO UPDATE SET
        last_byte_offset = excluded.last_byte_offset,
        last_ingested_at = excluded.last_ingested_at,
        fingerprint = excluded.fingerprint
"#;

/// SQLite store of ingested entries and ingest offsets
pub struct IndexedStore {
    pub(crate) pool: SqlitePool,
}

impl IndexedStore {
    /// Open (creating if needed) the database at `path` in WAL mode and
    /// bring its schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let mut conn = pool.acquire().await?;
        schema::initialize(&mut conn).await?;
        drop(conn);

        debug!("Opened indexed store at {}", path.display());
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub async fn ingest_state(&self, file_path: &str) -> Result<Option<IngestState>> {
        let state = sqlx::query_as::<_, IngestState>(
            "SELECT file_path, last_byte_offset, last_ingested_at, fingerprint FROM ingest_state WHERE file_path = ?",
        )
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    /// Insert a batch and advance the file's offset in one transaction.
    /// Returns the number of rows actually inserted; structured lines
    /// already present (same `entry_hash`) are ignored.
    pub async fn ingest_batch(
        &self,
        file_path: &str,
        batch: &IngestBatch,
        new_offset: u64,
        fingerprint: Option<&str>,
    ) -> Result<u64> {
        let ingested_at = timestamp::format(timestamp::now());
        let mut tx = self.pool.begin().await?;

        let mut inserted =
            insert_structured(&mut tx, file_path, &batch.structured, &ingested_at).await?;
        inserted += insert_raw(&mut tx, file_path, &batch.raw, &ingested_at).await?;

        save_state(&mut tx, file_path, new_offset, fingerprint, &ingested_at).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Entries matching `filter`, newest first.
    pub async fn query(&self, filter: &QueryFilter) -> Result<Vec<LogEntry>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, ts, event, level, agent, source, session, duration_ms, error, data_json, ingested_at, source_file, entry_hash FROM structured_logs WHERE 1=1",
        );
        push_predicates(&mut qb, filter);
        qb.push(" ORDER BY ts DESC, id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<StructuredRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(StructuredRow::into_entry).collect()
    }

    /// Number of entries matching `filter`, ignoring its limit.
    pub async fn count(&self, filter: &QueryFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM structured_logs WHERE 1=1");
        push_predicates(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Raw lines, newest first, optionally for a single source.
    pub async fn raw_logs(&self, source: Option<&str>, limit: usize) -> Result<Vec<RawRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, ts, source, level, message, raw_line, source_file, ingested_at FROM raw_logs WHERE 1=1",
        );
        if let Some(source) = source {
            qb.push(" AND source = ").push_bind(source.to_string());
        }
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        Ok(qb.build_query_as().fetch_all(&self.pool).await?)
    }
}

async fn insert_structured(
    conn: &mut SqliteConnection,
    file_path: &str,
    rows: &[StructuredInsert],
    ingested_at: &str,
) -> Result<u64> {
    let mut inserted = 0;
    for row in rows {
        let entry = &row.entry;
        let result = sqlx::query(INSERT_STRUCTURED)
            .bind(timestamp::format(entry.ts))
            .bind(&entry.event)
            .bind(entry.level.as_str())
            .bind(&entry.agent)
            .bind(&entry.source)
            .bind(&entry.session)
            .bind(entry.duration_ms.and_then(|d| i64::try_from(d).ok()))
            .bind(&entry.error)
            .bind(serde_json::to_string(&entry.data)?)
            .bind(ingested_at)
            .bind(file_path)
            .bind(&row.entry_hash)
            .execute(&mut *conn)
            .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

async fn insert_raw(
    conn: &mut SqliteConnection,
    file_path: &str,
    rows: &[RawRecord],
    ingested_at: &str,
) -> Result<u64> {
    let mut inserted = 0;
    for row in rows {
        let result = sqlx::query(INSERT_RAW)
            .bind(&row.ts)
            .bind(&row.source)
            .bind(&row.level)
            .bind(&row.message)
            .bind(&row.raw_line)
            .bind(file_path)
            .bind(ingested_at)
            .execute(&mut *conn)
            .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

async fn save_state(
    conn: &mut SqliteConnection,
    file_path: &str,
    offset: u64,
    fingerprint: Option<&str>,
    at: &str,
) -> Result<()> {
    sqlx::query(UPSERT_STATE)
        .bind(file_path)
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .bind(at)
        .bind(fingerprint)
        .execute(conn)
        .await?;
    Ok(())
}

fn push_predicates(qb: &mut QueryBuilder<'_, Sqlite>, filter: &QueryFilter) {
    if let Some(event) = &filter.event {
        qb.push(" AND event = ").push_bind(event.clone());
    }
    if let Some(level) = filter.level {
        qb.push(" AND level = ").push_bind(level.as_str());
    }
    if let Some(agent) = &filter.agent {
        qb.push(" AND agent = ").push_bind(agent.clone());
    }
    if let Some(from) = filter.from {
        qb.push(" AND ts >= ").push_bind(timestamp::format(from));
    }
    if let Some(to) = filter.to {
        qb.push(" AND ts <= ").push_bind(timestamp::format(to));
    }
    if let Some(grep) = &filter.grep {
        // instr() is case-sensitive, like the file scanner
        qb.push(" AND (instr(data_json, ")
            .push_bind(grep.clone())
            .push(") > 0 OR instr(coalesce(error, ''), ")
            .push_bind(grep.clone())
            .push(") > 0 OR instr(event, ")
            .push_bind(grep.clone())
            .push(") > 0 OR instr(coalesce(agent, ''), ")
            .push_bind(grep.clone())
            .push(") > 0)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evlog_core::{EntryMeta, Level};
    use serde_json::json;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn insert(event: &str, level: Level, minute: u8, data: serde_json::Value) -> StructuredInsert {
        let ts = datetime!(2026-02-26 12:00:00 UTC) + time::Duration::minutes(i64::from(minute));
        let entry = LogEntry::new(ts, event, level)
            .with_meta(EntryMeta::new().with_agent("brunel"))
            .with_data(data);
        let line = serde_json::to_string(&entry).unwrap();
        StructuredInsert::from_line(entry, &line)
    }

    fn structured(rows: Vec<StructuredInsert>) -> IngestBatch {
        IngestBatch {
            structured: rows,
            raw: Vec::new(),
        }
    }

    async fn store(dir: &TempDir) -> IndexedStore {
        IndexedStore::open(&dir.path().join("db").join("logs.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_ingest_and_query() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let rows = vec![
            insert("test.event", Level::Info, 0, json!({"n": 1})),
            insert("test.event", Level::Warn, 1, json!({"n": 2})),
            insert("test.event", Level::Error, 2, json!({"n": 3, "why": "timeout"})),
        ];
        let inserted = store
            .ingest_batch("/logs/test.event.jsonl", &structured(rows), 300, Some("abc"))
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let all = store.query(&QueryFilter::new()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].level, Level::Error, "newest first");
        assert_eq!(all[0].data, json!({"n": 3, "why": "timeout"}));
        assert_eq!(all[0].agent.as_deref(), Some("brunel"));

        let errors = QueryFilter::new().with_level(Level::Error);
        assert_eq!(store.count(&errors).await.unwrap(), 1);
        assert_eq!(store.count(&QueryFilter::new().with_grep("timeout")).await.unwrap(), 1);
        assert_eq!(store.count(&QueryFilter::new().with_agent("ada")).await.unwrap(), 0);

        let limited = store.query(&QueryFilter::new().with_limit(2)).await.unwrap();
        assert_eq!(limited.len(), 2);

        let state = store.ingest_state("/logs/test.event.jsonl").await.unwrap().unwrap();
        assert_eq!(state.offset(), 300);
        assert_eq!(state.fingerprint.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let batch = structured(vec![insert("dup", Level::Info, 0, json!({}))]);
        assert_eq!(store.ingest_batch("a", &batch, 10, None).await.unwrap(), 1);
        assert_eq!(store.ingest_batch("a", &batch, 20, None).await.unwrap(), 0);
        assert_eq!(store.count(&QueryFilter::new()).await.unwrap(), 1);
        assert_eq!(store.ingest_state("a").await.unwrap().unwrap().offset(), 20);
    }

    #[tokio::test]
    async fn test_time_range() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let rows: Vec<_> = (0..5).map(|m| insert("t", Level::Info, m, json!({"m": m}))).collect();
        store.ingest_batch("t", &structured(rows), 1, None).await.unwrap();

        let filter = QueryFilter::new().with_range(
            Some(datetime!(2026-02-26 12:01:00 UTC)),
            Some(datetime!(2026-02-26 12:03:00 UTC)),
        );
        assert_eq!(store.count(&filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_raw_rows() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let batch = IngestBatch {
            structured: Vec::new(),
            raw: vec![RawRecord {
                source: "gateway".to_string(),
                ts: None,
                level: None,
                message: None,
                raw_line: "plain".to_string(),
            }],
        };
        assert_eq!(store.ingest_batch("/var/log/gw.log", &batch, 6, None).await.unwrap(), 1);

        let stored = store.raw_logs(Some("gateway"), 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].raw_line.as_deref(), Some("plain"));
        assert_eq!(stored[0].source_file.as_deref(), Some("/var/log/gw.log"));
    }

    #[tokio::test]
    async fn test_reopen_keeps_state() {
        let dir = TempDir::new().unwrap();
        let store_a = store(&dir).await;
        store_a.ingest_batch("f", &IngestBatch::default(), 42, None).await.unwrap();
        store_a.close().await;

        let store_b = store(&dir).await;
        assert_eq!(store_b.ingest_state("f").await.unwrap().unwrap().offset(), 42);
    }
}
