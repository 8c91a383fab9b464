// tests/scheduler_inflight.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futfeed::config::SourceConfig;
use futfeed::error::FetchError;
use futfeed::ingest::providers::{Fetched, SourceAdapter};
use futfeed::ingest::types::{RawItem, RawPayload, SourceKind};
use futfeed::store::{MemStore, RecordStore};
use futfeed::{Scheduler, SchedulerCfg, TriggerOutcome};
use tokio::sync::Semaphore;

fn sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            key: "ge-globo".into(),
            kind: SourceKind::NewsRss,
            endpoint: "https://ge.globo.com/rss/".into(),
            interval_minutes: 60,
            enabled: true,
            max_items: 25,
        },
        SourceConfig {
            key: "tw-flamengo".into(),
            kind: SourceKind::SocialTwitter,
            endpoint: "Flamengo".into(),
            interval_minutes: 30,
            enabled: true,
            max_items: 25,
        },
        SourceConfig {
            key: "ig-neymarjr".into(),
            kind: SourceKind::SocialInstagram,
            endpoint: "neymarjr".into(),
            interval_minutes: 30,
            enabled: false,
            max_items: 25,
        },
    ]
}

/// Adapter that blocks in fetch until the test releases a permit, then
/// returns one item. Lets tests hold a source in flight deliberately.
struct GatedAdapter {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl SourceAdapter for GatedAdapter {
    async fn fetch(
        &self,
        source: &SourceConfig,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Fetched, FetchError> {
        self.gate
            .acquire()
            .await
            .expect("gate semaphore closed")
            .forget();
        Ok(Fetched::complete(vec![RawItem {
            source_key: source.key.clone(),
            fetched_at: Utc::now(),
            payload: RawPayload::NewsEntry {
                guid: Some(format!("{}-{}", source.key, Utc::now().timestamp_micros())),
                title: "Noticia".into(),
                summary: "Corpo".into(),
                link: None,
                published: None,
            },
        }]))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::NewsRss
    }
}

fn gated_scheduler(store: Arc<MemStore>, gate: Arc<Semaphore>) -> Arc<Scheduler> {
    let scheduler = Scheduler::new(store, SchedulerCfg::default()).with_adapter_factory(Arc::new(
        move |_source: &SourceConfig| {
            Box::new(GatedAdapter {
                gate: Arc::clone(&gate),
            }) as Box<dyn SourceAdapter>
        },
    ));
    Arc::new(scheduler)
}

#[tokio::test]
async fn trigger_is_rejected_while_source_is_in_flight() {
    let store = Arc::new(MemStore::new());
    let gate = Arc::new(Semaphore::new(0));
    let scheduler = gated_scheduler(Arc::clone(&store), Arc::clone(&gate));
    let sources = sources();

    assert_eq!(
        scheduler.trigger_now(&sources, "ge-globo"),
        TriggerOutcome::Accepted
    );
    // The run is parked in fetch; a second trigger must not queue.
    assert_eq!(
        scheduler.trigger_now(&sources, "ge-globo"),
        TriggerOutcome::AlreadyRunning
    );
    // A different source is unaffected by ge-globo's slot.
    assert_eq!(
        scheduler.trigger_now(&sources, "tw-flamengo"),
        TriggerOutcome::Accepted
    );

    gate.add_permits(2);
    scheduler.drain(Duration::from_secs(5)).await;

    // Slot is free again once the run finished.
    assert_eq!(
        scheduler.trigger_now(&sources, "ge-globo"),
        TriggerOutcome::Accepted
    );
    gate.add_permits(1);
    scheduler.drain(Duration::from_secs(5)).await;
    assert_eq!(store.runs().len(), 3);
}

#[tokio::test]
async fn unknown_source_is_refused() {
    let store = Arc::new(MemStore::new());
    let scheduler = gated_scheduler(store, Arc::new(Semaphore::new(0)));
    assert_eq!(
        scheduler.trigger_now(&sources(), "nao-existe"),
        TriggerOutcome::UnknownSource
    );
}

#[tokio::test]
async fn tick_starts_due_sources_and_skips_disabled_ones() {
    let store = Arc::new(MemStore::new());
    let gate = Arc::new(Semaphore::new(0));
    let scheduler = gated_scheduler(Arc::clone(&store), Arc::clone(&gate));
    let sources = sources();

    // Never-run sources are due; the disabled one stays out.
    let started = scheduler.tick(&sources).await;
    assert_eq!(started, 2);

    // Both are still in flight, so the next pass starts nothing.
    assert_eq!(scheduler.tick(&sources).await, 0);

    gate.add_permits(2);
    scheduler.drain(Duration::from_secs(5)).await;

    // Success moved both baselines forward; intervals have not elapsed.
    assert_eq!(scheduler.tick(&sources).await, 0);

    let runs = store.runs();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.source_key != "ig-neymarjr"));
}

#[tokio::test]
async fn due_check_follows_the_success_baseline() {
    let store = Arc::new(MemStore::new());
    let scheduler = gated_scheduler(Arc::clone(&store), Arc::new(Semaphore::new(0)));
    let source = &sources()[0];

    assert!(scheduler.is_due(source).await.unwrap(), "never run is due");

    store
        .advance_cursor("ge-globo", Utc::now() - chrono::Duration::minutes(10))
        .await
        .unwrap();
    assert!(!scheduler.is_due(source).await.unwrap());

    store
        .advance_cursor("ge-globo", Utc::now() - chrono::Duration::minutes(61))
        .await
        .unwrap();
    assert!(scheduler.is_due(source).await.unwrap());
}

#[tokio::test]
async fn triggered_run_lands_a_record() {
    let store = Arc::new(MemStore::new());
    let gate = Arc::new(Semaphore::new(1));
    let scheduler = gated_scheduler(Arc::clone(&store), gate);

    assert_eq!(
        scheduler.trigger_now(&sources(), "ge-globo"),
        TriggerOutcome::Accepted
    );
    scheduler.drain(Duration::from_secs(5)).await;

    assert_eq!(store.record_count(), 1);
    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].counts.new, 1);
}

#[tokio::test]
async fn stop_flag_is_visible_to_the_tick_loop() {
    let store = Arc::new(MemStore::new());
    let scheduler = gated_scheduler(store, Arc::new(Semaphore::new(0)));
    assert!(!scheduler.is_stopping());
    scheduler.stop();
    assert!(scheduler.is_stopping());
}
