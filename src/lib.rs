// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod scheduler;
pub mod store;
pub mod writer;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::SourceConfig;
pub use crate::error::{FetchError, NormalizeError, StoreError};
pub use crate::ingest::types::{Record, RunCounts, RunStatus, SourceKind};
pub use crate::scheduler::{Scheduler, SchedulerCfg, TriggerOutcome};
pub use crate::store::{InsertOutcome, MemStore, RecordStore, RefreshOutcome, SqliteStore};
