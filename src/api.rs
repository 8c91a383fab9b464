use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::config;
use crate::ingest::types::{IngestionRun, Record, SourceKind};
use crate::scheduler::{Scheduler, TriggerOutcome};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn RecordStore>,
    scheduler: Arc<Scheduler>,
}

pub fn create_router(store: Arc<dyn RecordStore>, scheduler: Arc<Scheduler>) -> Router {
    let state = AppState { store, scheduler };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats/runs", get(stats_runs))
        .route("/records", get(records))
        .route("/admin/trigger/{source_key}", post(trigger))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Latest IngestionRun per source: counts, status, timestamps. The
/// dashboard's main read path.
async fn stats_runs(
    State(state): State<AppState>,
) -> Result<Json<Vec<IngestionRun>>, StatusCode> {
    state
        .store
        .latest_runs()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

const MAX_RECORDS_PAGE: usize = 200;

/// Records filtered by source kind, newest first.
async fn records(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Record>>, StatusCode> {
    let kind = match q.get("kind").map(String::as_str) {
        None => None,
        Some(s) => Some(SourceKind::parse(s).ok_or(StatusCode::BAD_REQUEST)?),
    };
    let limit = q
        .get("limit")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(50)
        .min(MAX_RECORDS_PAGE);

    state
        .store
        .records_by_kind(kind, limit)
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

#[derive(serde::Serialize)]
struct TriggerResp {
    source_key: String,
    outcome: &'static str,
}

/// Force-run one source immediately. 202 accepted, 409 already running,
/// 404 unknown key.
async fn trigger(
    State(state): State<AppState>,
    Path(source_key): Path<String>,
) -> (StatusCode, Json<TriggerResp>) {
    let sources = config::load_sources_default().unwrap_or_default();
    let outcome = state.scheduler.trigger_now(&sources, &source_key);
    let (code, label) = match outcome {
        TriggerOutcome::Accepted => (StatusCode::ACCEPTED, "accepted"),
        TriggerOutcome::AlreadyRunning => (StatusCode::CONFLICT, "already-running"),
        TriggerOutcome::UnknownSource => (StatusCode::NOT_FOUND, "unknown-source"),
    };
    (
        code,
        Json(TriggerResp {
            source_key,
            outcome: label,
        }),
    )
}
