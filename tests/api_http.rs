// tests/api_http.rs
use std::sync::Arc;

use axum::body::Body;
use chrono::{Duration, Utc};
use futfeed::ingest::types::{Engagement, Record, RunCounts, RunStatus, SourceKind};
use futfeed::store::{MemStore, RecordStore};
use futfeed::{create_router, Scheduler, SchedulerCfg};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn router_with(store: Arc<MemStore>) -> axum::Router {
    let scheduler = Arc::new(Scheduler::new(
        store.clone() as Arc<dyn RecordStore>,
        SchedulerCfg::default(),
    ));
    create_router(store, scheduler)
}

fn record(fp: &str, kind: SourceKind) -> Record {
    Record {
        fingerprint: fp.into(),
        source_key: "ge-globo".into(),
        kind,
        title: "Fla vence".into(),
        body: "2 a 1 no Maracana".into(),
        author: String::new(),
        published_at: None,
        engagement: Engagement::default(),
        link: None,
        scraped_at: Utc::now(),
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = router_with(Arc::new(MemStore::new())).await;
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn records_endpoint_filters_by_kind() {
    let store = Arc::new(MemStore::new());
    store.insert_if_absent(&record("fp-news", SourceKind::NewsRss)).await.unwrap();
    store
        .insert_if_absent(&record("fp-tweet", SourceKind::SocialTwitter))
        .await
        .unwrap();
    let app = router_with(store).await;

    let resp = app
        .clone()
        .oneshot(
            Request::get("/records?kind=news-rss")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["fingerprint"], "fp-news");

    let resp = app
        .oneshot(Request::get("/records").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn bad_kind_is_a_400() {
    let app = router_with(Arc::new(MemStore::new())).await;
    let resp = app
        .oneshot(
            Request::get("/records?kind=carrier-pigeon")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_reports_latest_run_per_source() {
    let store = Arc::new(MemStore::new());
    let t = Utc::now() - Duration::minutes(5);
    let run_id = store.start_run("ge-globo", t).await.unwrap();
    store
        .finish_run(
            run_id,
            t + Duration::seconds(30),
            RunCounts { fetched: 5, new: 3, duplicate: 2, failed: 0 },
            RunStatus::Success,
        )
        .await
        .unwrap();
    let app = router_with(store).await;

    let resp = app
        .oneshot(Request::get("/stats/runs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["source_key"], "ge-globo");
    assert_eq!(json[0]["status"], "success");
    assert_eq!(json[0]["counts"]["new"], 3);
    assert_eq!(json[0]["counts"]["duplicate"], 2);
}

#[tokio::test]
async fn trigger_for_unknown_source_is_404() {
    let app = router_with(Arc::new(MemStore::new())).await;
    let resp = app
        .oneshot(
            Request::post("/admin/trigger/nao-existe")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["outcome"], "unknown-source");
    assert_eq!(json["source_key"], "nao-existe");
}
