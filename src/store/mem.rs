// src/store/mem.rs
//! In-process store with the same semantics as the SQLite one. Used by
//! tests; the mutex stands in for the database's uniqueness constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::ingest::types::{
    Engagement, IngestionRun, Record, RunCounts, RunStatus, SourceKind,
};
use crate::store::{InsertOutcome, RecordStore, RefreshOutcome, SourceCursor};

#[derive(Default)]
struct MemInner {
    records: HashMap<String, Record>,
    runs: Vec<IngestionRun>,
    cursors: HashMap<String, SourceCursor>,
    next_run_id: i64,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
    /// When set, record writes fail; lets tests exercise the run-fatal
    /// persistence path while run bookkeeping still lands.
    fail_record_writes: Mutex<bool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_record_writes(&self, fail: bool) {
        *self
            .fail_record_writes
            .lock()
            .expect("mem store mutex poisoned") = fail;
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if *self
            .fail_record_writes
            .lock()
            .expect("mem store mutex poisoned")
        {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().expect("mem store mutex poisoned").records.len()
    }

    pub fn runs(&self) -> Vec<IngestionRun> {
        self.inner.lock().expect("mem store mutex poisoned").runs.clone()
    }
}

#[async_trait]
impl RecordStore for MemStore {
    async fn exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let g = self.inner.lock().expect("mem store mutex poisoned");
        Ok(g.records.contains_key(fingerprint))
    }

    async fn insert_if_absent(&self, record: &Record) -> Result<InsertOutcome, StoreError> {
        self.check_writable()?;
        let mut g = self.inner.lock().expect("mem store mutex poisoned");
        if g.records.contains_key(&record.fingerprint) {
            return Ok(InsertOutcome::Duplicate);
        }
        g.records.insert(record.fingerprint.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn refresh_metrics(
        &self,
        fingerprint: &str,
        engagement: &Engagement,
    ) -> Result<RefreshOutcome, StoreError> {
        self.check_writable()?;
        let mut g = self.inner.lock().expect("mem store mutex poisoned");
        match g.records.get_mut(fingerprint) {
            Some(rec) => {
                rec.engagement = *engagement;
                Ok(RefreshOutcome::Refreshed)
            }
            None => Ok(RefreshOutcome::NotFound),
        }
    }

    async fn records_by_kind(
        &self,
        kind: Option<SourceKind>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let g = self.inner.lock().expect("mem store mutex poisoned");
        let mut out: Vec<Record> = g
            .records
            .values()
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn start_run(
        &self,
        source_key: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut g = self.inner.lock().expect("mem store mutex poisoned");
        g.next_run_id += 1;
        let id = g.next_run_id;
        g.runs.push(IngestionRun {
            id,
            source_key: source_key.to_string(),
            started_at,
            finished_at: None,
            counts: RunCounts::default(),
            status: RunStatus::Running,
        });
        Ok(id)
    }

    async fn finish_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        counts: RunCounts,
        status: RunStatus,
    ) -> Result<(), StoreError> {
        let mut g = self.inner.lock().expect("mem store mutex poisoned");
        if let Some(run) = g
            .runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::Running)
        {
            run.finished_at = Some(finished_at);
            run.counts = counts;
            run.status = status;
        }
        Ok(())
    }

    async fn latest_runs(&self) -> Result<Vec<IngestionRun>, StoreError> {
        let g = self.inner.lock().expect("mem store mutex poisoned");
        let mut latest: HashMap<&str, &IngestionRun> = HashMap::new();
        for run in &g.runs {
            latest
                .entry(run.source_key.as_str())
                .and_modify(|cur| {
                    if run.started_at > cur.started_at {
                        *cur = run;
                    }
                })
                .or_insert(run);
        }
        let mut out: Vec<IngestionRun> = latest.into_values().cloned().collect();
        out.sort_by(|a, b| a.source_key.cmp(&b.source_key));
        Ok(out)
    }

    async fn cursor(&self, source_key: &str) -> Result<SourceCursor, StoreError> {
        let g = self.inner.lock().expect("mem store mutex poisoned");
        Ok(g.cursors.get(source_key).cloned().unwrap_or(SourceCursor {
            source_key: source_key.to_string(),
            ..Default::default()
        }))
    }

    async fn touch_cursor(
        &self,
        source_key: &str,
        run_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut g = self.inner.lock().expect("mem store mutex poisoned");
        g.cursors
            .entry(source_key.to_string())
            .or_insert_with(|| SourceCursor {
                source_key: source_key.to_string(),
                ..Default::default()
            })
            .last_run_at = Some(run_at);
        Ok(())
    }

    async fn advance_cursor(
        &self,
        source_key: &str,
        success_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut g = self.inner.lock().expect("mem store mutex poisoned");
        g.cursors
            .entry(source_key.to_string())
            .or_insert_with(|| SourceCursor {
                source_key: source_key.to_string(),
                ..Default::default()
            })
            .last_success_at = Some(success_at);
        Ok(())
    }
}
