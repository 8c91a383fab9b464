// src/ingest/normalize.rs
//! Maps raw adapter output to the canonical [`Record`] shape.
//!
//! Fingerprints prefer a stable origin identifier (article GUID, tweet ID,
//! post ID) and fall back to a content hash over (source key, title, body,
//! author). Fetch timestamps never participate, so re-fetching identical
//! content across runs yields the same fingerprint.

use sha2::{Digest, Sha256};

use crate::error::NormalizeError;
use crate::ingest::types::{RawItem, RawPayload, Record};

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cap body length at 10k chars; headlines and captions are far shorter,
/// full article bodies occasionally are not.
const MAX_BODY_CHARS: usize = 10_000;

fn cap_body(mut s: String) -> String {
    if s.chars().count() > MAX_BODY_CHARS {
        s = s.chars().take(MAX_BODY_CHARS).collect();
    }
    s
}

fn native_fingerprint(source_key: &str, native_id: &str) -> String {
    let mut h = Sha256::new();
    h.update(b"native\x1f");
    h.update(source_key.as_bytes());
    h.update(b"\x1f");
    h.update(native_id.as_bytes());
    format!("{:x}", h.finalize())
}

fn content_fingerprint(source_key: &str, title: &str, body: &str, author: &str) -> String {
    let mut h = Sha256::new();
    h.update(b"content\x1f");
    for part in [source_key, title, body, author] {
        h.update(part.trim().as_bytes());
        h.update(b"\x1f");
    }
    format!("{:x}", h.finalize())
}

/// Pure: turns one raw item into a canonical record or an item-local error.
pub fn normalize(item: RawItem) -> Result<Record, NormalizeError> {
    let RawItem {
        source_key,
        fetched_at,
        payload,
    } = item;
    let kind = payload.kind();

    let (native_id, title, body, author, published_at, link, engagement) = match payload {
        RawPayload::NewsEntry {
            guid,
            title,
            summary,
            link,
            published,
        } => (
            guid,
            normalize_text(&title),
            normalize_text(&summary),
            String::new(),
            published,
            link,
            Default::default(),
        ),
        RawPayload::HtmlArticle { url, title, body } => (
            None,
            normalize_text(&title),
            normalize_text(&body),
            String::new(),
            None,
            Some(url),
            Default::default(),
        ),
        RawPayload::TweetPost {
            id,
            text,
            author,
            created_at,
            metrics,
        } => (
            Some(id),
            String::new(),
            normalize_text(&text),
            author,
            created_at,
            None,
            metrics,
        ),
        RawPayload::InstaPost {
            id,
            caption,
            author,
            taken_at,
            metrics,
        } => (
            Some(id),
            String::new(),
            normalize_text(&caption),
            author,
            taken_at,
            None,
            metrics,
        ),
    };

    if title.is_empty() && body.is_empty() {
        return Err(NormalizeError::new(source_key, "no title or body text"));
    }

    let fingerprint = match native_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => native_fingerprint(&source_key, id),
        _ => content_fingerprint(&source_key, &title, &body, &author),
    };

    Ok(Record {
        fingerprint,
        source_key,
        kind,
        title,
        body: cap_body(body),
        author,
        published_at,
        engagement,
        link,
        scraped_at: fetched_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Engagement;
    use chrono::{TimeZone, Utc};

    fn news_item(guid: Option<&str>, title: &str, summary: &str) -> RawItem {
        RawItem {
            source_key: "ge-globo".into(),
            fetched_at: Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap(),
            payload: RawPayload::NewsEntry {
                guid: guid.map(Into::into),
                title: title.into(),
                summary: summary.into(),
                link: None,
                published: None,
            },
        }
    }

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <b>Fla&nbsp;vence</b>   o cl\u{00E1}ssico!  ";
        assert_eq!(normalize_text(s), "Fla vence o cl\u{00E1}ssico!");
    }

    #[test]
    fn native_id_wins_over_content() {
        let a = normalize(news_item(Some("guid-1"), "Title A", "body")).unwrap();
        let b = normalize(news_item(Some("guid-1"), "Title B changed", "other")).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn content_hash_ignores_fetch_time() {
        let mut x = news_item(None, "Mesmo titulo", "mesmo corpo");
        let mut y = news_item(None, "Mesmo titulo", "mesmo corpo");
        if let (RawItem { fetched_at: fa, .. }, RawItem { fetched_at: fb, .. }) = (&mut x, &mut y) {
            *fa = Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap();
            *fb = Utc.with_ymd_and_hms(2025, 5, 11, 9, 30, 0).unwrap();
        }
        let a = normalize(x).unwrap();
        let b = normalize(y).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn empty_item_is_a_normalize_error() {
        let err = normalize(news_item(None, " ", "<p></p>")).unwrap_err();
        assert_eq!(err.source_key, "ge-globo");
    }

    #[test]
    fn tweet_carries_metrics_and_author() {
        let item = RawItem {
            source_key: "tw-flamengo".into(),
            fetched_at: Utc::now(),
            payload: RawPayload::TweetPost {
                id: "17".into(),
                text: "Gol do Mengo!".into(),
                author: "Flamengo".into(),
                created_at: None,
                metrics: Engagement {
                    likes: 10,
                    comments: 2,
                    shares: 3,
                },
            },
        };
        let rec = normalize(item).unwrap();
        assert_eq!(rec.author, "Flamengo");
        assert_eq!(rec.engagement.likes, 10);
        assert_eq!(rec.kind, crate::ingest::types::SourceKind::SocialTwitter);
    }
}
