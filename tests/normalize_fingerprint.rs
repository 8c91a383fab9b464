// tests/normalize_fingerprint.rs
use chrono::{Duration, Utc};
use futfeed::ingest::normalize::normalize;
use futfeed::ingest::types::{Engagement, RawItem, RawPayload};

fn tweet(id: &str, text: &str, fetched_offset_hours: i64) -> RawItem {
    RawItem {
        source_key: "tw-flamengo".into(),
        fetched_at: Utc::now() + Duration::hours(fetched_offset_hours),
        payload: RawPayload::TweetPost {
            id: id.into(),
            text: text.into(),
            author: "Flamengo".into(),
            created_at: None,
            metrics: Engagement::default(),
        },
    }
}

fn news(source_key: &str, title: &str, summary: &str) -> RawItem {
    RawItem {
        source_key: source_key.into(),
        fetched_at: Utc::now(),
        payload: RawPayload::NewsEntry {
            guid: None,
            title: title.into(),
            summary: summary.into(),
            link: None,
            published: None,
        },
    }
}

#[test]
fn same_native_id_different_fetch_times_same_fingerprint() {
    let a = normalize(tweet("1787001", "FIM DE JOGO!", 0)).unwrap();
    let b = normalize(tweet("1787001", "FIM DE JOGO! (editado)", 6)).unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn no_native_id_identical_content_same_fingerprint() {
    let a = normalize(news("ge-globo", "Fla vence", "2 a 1 no Maracana")).unwrap();
    let b = normalize(news("ge-globo", "Fla vence", "2 a 1 no Maracana")).unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn content_hash_distinguishes_sources_and_text() {
    let a = normalize(news("ge-globo", "Fla vence", "2 a 1")).unwrap();
    let other_source = normalize(news("lance", "Fla vence", "2 a 1")).unwrap();
    let other_text = normalize(news("ge-globo", "Fla vence", "3 a 1")).unwrap();
    assert_ne!(a.fingerprint, other_source.fingerprint);
    assert_ne!(a.fingerprint, other_text.fingerprint);
}

#[test]
fn whitespace_and_markup_noise_does_not_change_fingerprint() {
    let a = normalize(news("ge-globo", "Fla  vence", "<p>2 a 1</p>")).unwrap();
    let b = normalize(news("ge-globo", " Fla vence ", "2 a 1")).unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn item_without_text_fails_normalization() {
    assert!(normalize(news("ge-globo", "", "  ")).is_err());
}
