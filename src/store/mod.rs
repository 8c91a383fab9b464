// src/store/mod.rs
//! Persistent dedup store: records keyed by fingerprint, run history, and
//! per-source scheduler cursors.
//!
//! All writes funnel through `insert_if_absent`/`refresh_metrics`; the
//! fingerprint uniqueness constraint in the backing table is what keeps
//! duplicate records out across restarts and overlapping scheduler
//! processes. No in-process lock substitutes for it.

pub mod mem;
pub mod sqlite;

pub use mem::MemStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::ingest::types::{Engagement, IngestionRun, Record, RunCounts, RunStatus, SourceKind};

/// Outcome of an `insert_if_absent` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Outcome of a `refresh_metrics` call. `NotFound` covers the race where
/// a refresh arrives before the corresponding insert commits; callers
/// treat it as a skipped refresh, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    NotFound,
}

/// Per-source scheduler state held in the shared store so several
/// scheduler instances can coordinate through the same database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCursor {
    pub source_key: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn exists(&self, fingerprint: &str) -> Result<bool, StoreError>;

    /// Atomic per fingerprint: of N concurrent calls with the same
    /// fingerprint exactly one observes `Inserted`.
    async fn insert_if_absent(&self, record: &Record) -> Result<InsertOutcome, StoreError>;

    /// Updates engagement counters only; identity fields and text are
    /// never touched.
    async fn refresh_metrics(
        &self,
        fingerprint: &str,
        engagement: &Engagement,
    ) -> Result<RefreshOutcome, StoreError>;

    /// Newest-first records, optionally filtered by source kind.
    async fn records_by_kind(
        &self,
        kind: Option<SourceKind>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;

    /// Opens a run row in `running` state; returns its id.
    async fn start_run(
        &self,
        source_key: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Finalizes a run. `status` must be terminal.
    async fn finish_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        counts: RunCounts,
        status: RunStatus,
    ) -> Result<(), StoreError>;

    /// Latest run per source, for the stats surface.
    async fn latest_runs(&self) -> Result<Vec<IngestionRun>, StoreError>;

    async fn cursor(&self, source_key: &str) -> Result<SourceCursor, StoreError>;

    /// Records that a run started now, without touching the success baseline.
    async fn touch_cursor(
        &self,
        source_key: &str,
        run_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Advances the success baseline to `success_at` (the run's start time,
    /// so items published during the run are still picked up next time).
    async fn advance_cursor(
        &self,
        source_key: &str,
        success_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
