// src/store/sqlite.rs
//! SQLite-backed store. The `records.fingerprint` primary key is the
//! durability guarantee against duplicates surviving restarts or
//! overlapping runs; `INSERT .. ON CONFLICT DO NOTHING` decides
//! inserted-vs-duplicate atomically inside the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::error::StoreError;
use crate::ingest::types::{
    Engagement, IngestionRun, Record, RunCounts, RunStatus, SourceKind,
};
use crate::store::{InsertOutcome, RecordStore, RefreshOutcome, SourceCursor};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    fingerprint  TEXT PRIMARY KEY,
    source_key   TEXT NOT NULL,
    kind         TEXT NOT NULL,
    title        TEXT NOT NULL,
    body         TEXT NOT NULL,
    author       TEXT NOT NULL,
    published_at TEXT,
    likes        INTEGER NOT NULL DEFAULT 0,
    comments     INTEGER NOT NULL DEFAULT 0,
    shares       INTEGER NOT NULL DEFAULT 0,
    link         TEXT,
    scraped_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_kind_scraped
    ON records (kind, scraped_at DESC);

CREATE TABLE IF NOT EXISTS ingestion_runs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    source_key  TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    fetched     INTEGER NOT NULL DEFAULT 0,
    "new"       INTEGER NOT NULL DEFAULT 0,
    duplicate   INTEGER NOT NULL DEFAULT 0,
    failed      INTEGER NOT NULL DEFAULT 0,
    status      TEXT NOT NULL DEFAULT 'running'
);
CREATE INDEX IF NOT EXISTS idx_runs_source_started
    ON ingestion_runs (source_key, started_at DESC);

CREATE TABLE IF NOT EXISTS source_cursors (
    source_key      TEXT PRIMARY KEY,
    last_success_at TEXT,
    last_run_at     TEXT
);
"#;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database file and applies the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Record, StoreError> {
    let kind_s: String = row.try_get("kind")?;
    let kind = SourceKind::parse(&kind_s)
        .ok_or_else(|| StoreError::Unavailable(format!("unknown kind '{kind_s}' in records")))?;
    Ok(Record {
        fingerprint: row.try_get("fingerprint")?,
        source_key: row.try_get("source_key")?,
        kind,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author: row.try_get("author")?,
        published_at: row.try_get("published_at")?,
        engagement: Engagement {
            likes: row.try_get::<i64, _>("likes")?.max(0) as u64,
            comments: row.try_get::<i64, _>("comments")?.max(0) as u64,
            shares: row.try_get::<i64, _>("shares")?.max(0) as u64,
        },
        link: row.try_get("link")?,
        scraped_at: row.try_get("scraped_at")?,
    })
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<IngestionRun, StoreError> {
    let status_s: String = row.try_get("status")?;
    let status = RunStatus::parse(&status_s)
        .ok_or_else(|| StoreError::Unavailable(format!("unknown run status '{status_s}'")))?;
    Ok(IngestionRun {
        id: row.try_get("id")?,
        source_key: row.try_get("source_key")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        counts: RunCounts {
            fetched: row.try_get::<i64, _>("fetched")?.max(0) as u64,
            new: row.try_get::<i64, _>("new")?.max(0) as u64,
            duplicate: row.try_get::<i64, _>("duplicate")?.max(0) as u64,
            failed: row.try_get::<i64, _>("failed")?.max(0) as u64,
        },
        status,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM records WHERE fingerprint = ?1")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_if_absent(&self, record: &Record) -> Result<InsertOutcome, StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO records
                (fingerprint, source_key, kind, title, body, author,
                 published_at, likes, comments, shares, link, scraped_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(fingerprint) DO NOTHING
            "#,
        )
        .bind(&record.fingerprint)
        .bind(&record.source_key)
        .bind(record.kind.as_str())
        .bind(&record.title)
        .bind(&record.body)
        .bind(&record.author)
        .bind(record.published_at)
        .bind(record.engagement.likes as i64)
        .bind(record.engagement.comments as i64)
        .bind(record.engagement.shares as i64)
        .bind(&record.link)
        .bind(record.scraped_at)
        .execute(&self.pool)
        .await?;

        Ok(if res.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        })
    }

    async fn refresh_metrics(
        &self,
        fingerprint: &str,
        engagement: &Engagement,
    ) -> Result<RefreshOutcome, StoreError> {
        let res = sqlx::query(
            "UPDATE records SET likes = ?2, comments = ?3, shares = ?4 WHERE fingerprint = ?1",
        )
        .bind(fingerprint)
        .bind(engagement.likes as i64)
        .bind(engagement.comments as i64)
        .bind(engagement.shares as i64)
        .execute(&self.pool)
        .await?;

        Ok(if res.rows_affected() == 1 {
            RefreshOutcome::Refreshed
        } else {
            RefreshOutcome::NotFound
        })
    }

    async fn records_by_kind(
        &self,
        kind: Option<SourceKind>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let rows = match kind {
            Some(k) => {
                sqlx::query(
                    "SELECT * FROM records WHERE kind = ?1 ORDER BY scraped_at DESC LIMIT ?2",
                )
                .bind(k.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM records ORDER BY scraped_at DESC LIMIT ?1")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(record_from_row).collect()
    }

    async fn start_run(
        &self,
        source_key: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let res = sqlx::query(
            "INSERT INTO ingestion_runs (source_key, started_at) VALUES (?1, ?2)",
        )
        .bind(source_key)
        .bind(started_at)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn finish_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        counts: RunCounts,
        status: RunStatus,
    ) -> Result<(), StoreError> {
        debug_assert!(status.is_terminal());
        sqlx::query(
            r#"
            UPDATE ingestion_runs
               SET finished_at = ?2, fetched = ?3, "new" = ?4,
                   duplicate = ?5, failed = ?6, status = ?7
             WHERE id = ?1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(finished_at)
        .bind(counts.fetched as i64)
        .bind(counts.new as i64)
        .bind(counts.duplicate as i64)
        .bind(counts.failed as i64)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_runs(&self) -> Result<Vec<IngestionRun>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.* FROM ingestion_runs r
            JOIN (SELECT source_key, MAX(started_at) AS ms
                    FROM ingestion_runs GROUP BY source_key) last
              ON r.source_key = last.source_key AND r.started_at = last.ms
            ORDER BY r.source_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(run_from_row).collect()
    }

    async fn cursor(&self, source_key: &str) -> Result<SourceCursor, StoreError> {
        let row = sqlx::query("SELECT * FROM source_cursors WHERE source_key = ?1")
            .bind(source_key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(SourceCursor {
                source_key: r.try_get("source_key")?,
                last_success_at: r.try_get("last_success_at")?,
                last_run_at: r.try_get("last_run_at")?,
            }),
            None => Ok(SourceCursor {
                source_key: source_key.to_string(),
                ..Default::default()
            }),
        }
    }

    async fn touch_cursor(
        &self,
        source_key: &str,
        run_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO source_cursors (source_key, last_run_at) VALUES (?1, ?2)
            ON CONFLICT(source_key) DO UPDATE SET last_run_at = excluded.last_run_at
            "#,
        )
        .bind(source_key)
        .bind(run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn advance_cursor(
        &self,
        source_key: &str,
        success_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO source_cursors (source_key, last_success_at) VALUES (?1, ?2)
            ON CONFLICT(source_key) DO UPDATE SET last_success_at = excluded.last_success_at
            "#,
        )
        .bind(source_key)
        .bind(success_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
