// src/ingest/mod.rs
pub mod normalize;
pub mod providers;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;

use crate::config::SourceConfig;
use crate::error::StoreError;
use crate::ingest::providers::SourceAdapter;
use crate::ingest::types::{Record, RunCounts, RunStatus};
use crate::store::{InsertOutcome, RecordStore};
use crate::writer::WriterPayload;

/// Final shape of one run, as recorded on its IngestionRun row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: i64,
    pub counts: RunCounts,
    pub status: RunStatus,
}

/// Execute one ingestion run for one source: fetch, normalize each item,
/// dedup-insert, tally, finalize the run row on every path.
///
/// Item-level failures are counted and skipped; an adapter-level error
/// fails the run and leaves the source's success baseline untouched; an
/// adapter error mid-stream after durable inserts records `partial` and
/// advances the baseline to the run start. A raised `stop` flag ends the
/// item loop early the same way a mid-stream adapter error would.
pub async fn run_source_once(
    store: &dyn RecordStore,
    adapter: &dyn SourceAdapter,
    source: &SourceConfig,
    sink: Option<&mpsc::Sender<WriterPayload>>,
    stop: Option<&AtomicBool>,
) -> Result<RunOutcome, StoreError> {
    let t0 = std::time::Instant::now();
    let started_at = Utc::now();

    let run_id = store.start_run(&source.key, started_at).await?;
    store.touch_cursor(&source.key, started_at).await?;
    counter!("ingest_runs_total").increment(1);

    let since = match store.cursor(&source.key).await {
        Ok(c) => c.last_success_at,
        Err(e) => {
            let _ = store
                .finish_run(run_id, Utc::now(), RunCounts::default(), RunStatus::Failed)
                .await;
            return Err(e);
        }
    };

    let fetched = match adapter.fetch(source, since).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(source = %source.key, error = %e, backoff = e.should_back_off(), "fetch failed");
            counter!("ingest_fetch_errors_total").increment(1);
            let counts = RunCounts::default();
            store
                .finish_run(run_id, Utc::now(), counts, RunStatus::Failed)
                .await?;
            finish_telemetry(t0);
            return Ok(RunOutcome {
                run_id,
                counts,
                status: RunStatus::Failed,
            });
        }
    };

    let mut counts = RunCounts {
        fetched: fetched.items.len() as u64,
        ..Default::default()
    };
    let mut new_records: Vec<Record> = Vec::new();
    let mut stopped_early = false;

    for item in fetched.items {
        if stop.is_some_and(|s| s.load(Ordering::Relaxed)) {
            stopped_early = true;
            break;
        }
        let record = match normalize::normalize(item) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(source = %source.key, error = %e, "item failed normalization");
                counter!("ingest_items_failed_total").increment(1);
                counts.failed += 1;
                continue;
            }
        };

        match store.insert_if_absent(&record).await {
            Ok(InsertOutcome::Inserted) => {
                counts.new += 1;
                counter!("ingest_records_new_total").increment(1);
                new_records.push(record);
            }
            Ok(InsertOutcome::Duplicate) => {
                counts.duplicate += 1;
                counter!("ingest_records_duplicate_total").increment(1);
                // Re-scraped social posts carry fresh engagement counts.
                // NotFound (refresh racing an uncommitted insert) is a
                // skipped refresh, not an error.
                if !record.engagement.is_zero() {
                    if let Err(e) = store
                        .refresh_metrics(&record.fingerprint, &record.engagement)
                        .await
                    {
                        tracing::error!(source = %source.key, error = %e, "store rejected refresh");
                        counter!("ingest_store_errors_total").increment(1);
                        let _ = store
                            .finish_run(run_id, Utc::now(), counts, RunStatus::Failed)
                            .await;
                        finish_telemetry(t0);
                        return Ok(RunOutcome {
                            run_id,
                            counts,
                            status: RunStatus::Failed,
                        });
                    }
                }
            }
            Err(e) => {
                // Store down mid-run: no partial credit, run is failed.
                tracing::error!(source = %source.key, error = %e, "store rejected insert");
                counter!("ingest_store_errors_total").increment(1);
                let _ = store
                    .finish_run(run_id, Utc::now(), counts, RunStatus::Failed)
                    .await;
                finish_telemetry(t0);
                return Ok(RunOutcome {
                    run_id,
                    counts,
                    status: RunStatus::Failed,
                });
            }
        }
    }

    let interrupted = fetched.interrupted.is_some() || stopped_early;
    let processed = counts.new + counts.duplicate;
    let status = match (interrupted, processed) {
        (false, _) => RunStatus::Success,
        (true, 0) => RunStatus::Failed,
        (true, _) => RunStatus::Partial,
    };
    if let Some(e) = &fetched.interrupted {
        counter!("ingest_fetch_errors_total").increment(1);
        tracing::warn!(source = %source.key, error = %e, "fetch interrupted mid-stream");
    }

    store.finish_run(run_id, Utc::now(), counts, status).await?;
    // Ingested items are durable; success and partial both move the
    // baseline to the run start so they are not re-fetched.
    if status != RunStatus::Failed {
        store.advance_cursor(&source.key, started_at).await?;
    }
    finish_telemetry(t0);

    tracing::info!(
        target: "ingest",
        source = %source.key,
        fetched = counts.fetched,
        new = counts.new,
        duplicate = counts.duplicate,
        failed = counts.failed,
        status = status.as_str(),
        "run finished"
    );

    if let Some(tx) = sink {
        for record in new_records {
            if tx.send(WriterPayload::from_record(&record)).await.is_err() {
                tracing::warn!("writer channel closed; dropping handoff");
                break;
            }
        }
    }

    Ok(RunOutcome {
        run_id,
        counts,
        status,
    })
}

fn finish_telemetry(t0: std::time::Instant) {
    histogram!("ingest_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    gauge!("ingest_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
}
