//! futfeed — Binary Entrypoint
//! Boots the ingestion scheduler and the Axum stats/trigger surface.
//!
//! See `README.md` for quickstart and `config/sources.toml` for the
//! source list format.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use futfeed::metrics::Metrics;
use futfeed::scheduler::{Scheduler, SchedulerCfg};
use futfeed::store::SqliteStore;
use futfeed::writer::{spawn_writer_task, LoggingWriter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("futfeed=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let db_path = std::env::var("FUTFEED_DB_PATH").unwrap_or_else(|_| "data/futfeed.db".into());
    let db_path = PathBuf::from(db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(&db_path).await?);

    let cfg = SchedulerCfg::default();
    let metrics = Metrics::init(cfg.tick_seconds);

    let (writer_tx, _writer_handle) = spawn_writer_task(LoggingWriter, cfg.writer_buffer);
    let scheduler = Arc::new(Scheduler::new(store.clone(), cfg).with_writer(writer_tx));
    let tick_handle = Arc::clone(&scheduler).spawn();

    let router = futfeed::api::create_router(store, Arc::clone(&scheduler))
        .merge(metrics.router());

    let addr = std::env::var("FUTFEED_LISTEN").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "serving stats surface");

    let scheduler_for_shutdown = Arc::clone(&scheduler);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
            scheduler_for_shutdown.stop();
        })
        .await?;

    // Let in-flight runs finalize their IngestionRun rows before exit.
    scheduler.drain(std::time::Duration::from_secs(10)).await;
    tick_handle.abort();
    Ok(())
}
