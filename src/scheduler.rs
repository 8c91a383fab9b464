// src/scheduler.rs
//! Tick-driven ingestion scheduler.
//!
//! Wakes on a fixed tick (default 60 s), re-reads the source config, and
//! starts one run per due source on its own tokio task. At most one run
//! per source is in flight at a time; a still-running source is skipped
//! on the next tick, never queued. Different sources overlap freely.
//!
//! Per-source interval bookkeeping lives in the store's cursor table, not
//! in process globals, so concurrently deployed scheduler instances
//! coordinate through the same uniqueness-constrained database.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{self, SourceConfig};
use crate::error::StoreError;
use crate::ingest::providers::{self, SourceAdapter};
use crate::ingest::run_source_once;
use crate::store::RecordStore;
use crate::writer::WriterPayload;

/// Builds the adapter for a source; overridable so tests can inject
/// slow or scripted adapters.
pub type AdapterFactory =
    Arc<dyn Fn(&SourceConfig) -> Box<dyn SourceAdapter> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerCfg {
    /// Tick granularity in seconds; due sources are checked this often.
    pub tick_seconds: u64,
    /// Writer handoff channel capacity.
    pub writer_buffer: usize,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            writer_buffer: 256,
        }
    }
}

/// Outcome of a manual trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
    AlreadyRunning,
    UnknownSource,
}

pub struct Scheduler {
    store: Arc<dyn RecordStore>,
    adapters: AdapterFactory,
    in_flight: Mutex<HashSet<String>>,
    stopping: AtomicBool,
    writer_tx: Option<mpsc::Sender<WriterPayload>>,
    cfg: SchedulerCfg,
}

impl Scheduler {
    pub fn new(store: Arc<dyn RecordStore>, cfg: SchedulerCfg) -> Self {
        let client = providers::http_client();
        Self {
            store,
            adapters: Arc::new(move |source: &SourceConfig| {
                providers::adapter_for(source.kind, &client)
            }),
            in_flight: Mutex::new(HashSet::new()),
            stopping: AtomicBool::new(false),
            writer_tx: None,
            cfg,
        }
    }

    pub fn with_writer(mut self, tx: mpsc::Sender<WriterPayload>) -> Self {
        self.writer_tx = Some(tx);
        self
    }

    pub fn with_adapter_factory(mut self, factory: AdapterFactory) -> Self {
        self.adapters = factory;
        self
    }

    /// Signals shutdown: the tick loop exits and in-flight runs finish
    /// their current item, finalizing as partial/failed instead of being
    /// left open.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Relaxed)
    }

    fn source_running(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight set poisoned")
            .contains(key)
    }

    /// Whether a source's interval has elapsed since its last successful
    /// run. Never-run sources are always due.
    pub async fn is_due(&self, source: &SourceConfig) -> Result<bool, StoreError> {
        let cursor = self.store.cursor(&source.key).await?;
        Ok(match cursor.last_success_at {
            None => true,
            Some(last) => Utc::now() - last >= Duration::minutes(source.interval_minutes as i64),
        })
    }

    /// One scheduler pass over the given sources. Returns how many runs
    /// were started.
    pub async fn tick(self: &Arc<Self>, sources: &[SourceConfig]) -> usize {
        let mut started = 0;
        for source in sources {
            if !source.enabled || self.source_running(&source.key) {
                continue;
            }
            match self.is_due(source).await {
                Ok(true) => {
                    if self.try_start(source.clone()) {
                        started += 1;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    error!(source = %source.key, error = %e, "due check failed");
                }
            }
        }
        started
    }

    /// Force-run one source immediately, bypassing the interval check but
    /// not the single-in-flight rule.
    pub fn trigger_now(self: &Arc<Self>, sources: &[SourceConfig], key: &str) -> TriggerOutcome {
        let Some(source) = sources.iter().find(|s| s.key == key) else {
            return TriggerOutcome::UnknownSource;
        };
        if self.try_start(source.clone()) {
            TriggerOutcome::Accepted
        } else {
            TriggerOutcome::AlreadyRunning
        }
    }

    /// Claims the in-flight slot and spawns the run task. Returns false
    /// when the source is already running.
    fn try_start(self: &Arc<Self>, source: SourceConfig) -> bool {
        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
            if !in_flight.insert(source.key.clone()) {
                return false;
            }
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let adapter = (this.adapters)(&source);
            let result = run_source_once(
                this.store.as_ref(),
                adapter.as_ref(),
                &source,
                this.writer_tx.as_ref(),
                Some(&this.stopping),
            )
            .await;
            if let Err(e) = result {
                error!(source = %source.key, error = %e, "run aborted on store error");
            }
            this.in_flight
                .lock()
                .expect("in-flight set poisoned")
                .remove(&source.key);
        });
        true
    }

    /// Spawn the periodic tick loop. Config is re-read every tick so
    /// source edits apply without a restart.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(self.cfg.tick_seconds));
            loop {
                ticker.tick().await;
                if self.is_stopping() {
                    info!("scheduler stopping");
                    break;
                }
                let sources = match config::load_sources_default() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "could not load sources; skipping tick");
                        continue;
                    }
                };
                let started = self.tick(&sources).await;
                if started > 0 {
                    info!(started, total = sources.len(), "tick started runs");
                }
            }
        })
    }

    /// Best-effort graceful drain: waits until no runs are in flight or
    /// the timeout elapses.
    pub async fn drain(&self, timeout: std::time::Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let empty = self
                .in_flight
                .lock()
                .expect("in-flight set poisoned")
                .is_empty();
            if empty || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}
