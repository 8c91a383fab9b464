//! Prometheus wiring for the ingestion pipeline.
//!
//! Every failure path in the pipeline increments one of the counters
//! registered here, so nothing fails silently; the scrape endpoint is
//! merged into the main router by the binary.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the recorder, describe the pipeline's series, and publish
    /// the scheduler tick granularity as a static gauge.
    pub fn init(tick_seconds: u64) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!("ingest_runs_total", "Ingestion runs started.");
        describe_counter!("ingest_items_fetched_total", "Raw items fetched from adapters.");
        describe_counter!("ingest_records_new_total", "Records inserted as new.");
        describe_counter!(
            "ingest_records_duplicate_total",
            "Items dropped by fingerprint dedup."
        );
        describe_counter!("ingest_items_failed_total", "Items that failed normalization.");
        describe_counter!("ingest_fetch_errors_total", "Adapter fetch errors.");
        describe_counter!("ingest_store_errors_total", "Dedup store errors.");
        describe_counter!("writer_articles_total", "Payloads the article writer consumed.");
        describe_counter!("writer_errors_total", "Article writer failures.");
        describe_histogram!("ingest_parse_ms", "Adapter parse time in milliseconds.");
        describe_histogram!("ingest_run_ms", "Full run duration in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when any source last finished a run."
        );
        describe_gauge!("ingest_tick_seconds", "Scheduler tick granularity.");
        gauge!("ingest_tick_seconds").set(tick_seconds as f64);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
