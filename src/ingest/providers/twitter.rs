// src/ingest/providers/twitter.rs
//! Twitter/X adapter. Bearer-token API: resolve the handle to a user id,
//! then page the timeline. A missing token is an auth failure, 429 is a
//! rate limit; both tell the scheduler to back off for this run.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingest::types::{Engagement, RawItem, RawPayload, SourceKind};

const ENV_BEARER: &str = "TWITTER_BEARER_TOKEN";
const API_BASE: &str = "https://api.twitter.com/2";

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    retweet_count: u64,
}

pub struct TwitterAdapter {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        bearer: Option<String>,
    },
}

impl TwitterAdapter {
    pub fn from_fixture(timeline_json: &str) -> Self {
        Self {
            mode: Mode::Fixture(timeline_json.to_string()),
        }
    }

    /// Reads `TWITTER_BEARER_TOKEN`; the missing-token case surfaces as
    /// an auth error at fetch time, not at construction.
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                client,
                bearer: std::env::var(ENV_BEARER).ok(),
            },
        }
    }
}

/// Parse a timeline response body into raw items. The account handle is
/// the source endpoint.
pub fn parse_timeline(
    source: &SourceConfig,
    body: &str,
    fetched_at: DateTime<Utc>,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<RawItem>, FetchError> {
    let resp: TimelineResponse = serde_json::from_str(body)
        .context("parsing tweet timeline json")
        .map_err(FetchError::Parse)?;

    let mut out = Vec::with_capacity(resp.data.len());
    for tw in resp.data {
        if let (Some(since), Some(created)) = (since, tw.created_at) {
            if created <= since {
                continue;
            }
        }
        out.push(RawItem {
            source_key: source.key.clone(),
            fetched_at,
            payload: RawPayload::TweetPost {
                id: tw.id,
                text: tw.text,
                author: source.endpoint.clone(),
                created_at: tw.created_at,
                metrics: Engagement {
                    likes: tw.public_metrics.like_count,
                    comments: tw.public_metrics.reply_count,
                    shares: tw.public_metrics.retweet_count,
                },
            },
        });
        if out.len() >= source.max_items {
            break;
        }
    }
    Ok(out)
}

async fn get_json(
    client: &reqwest::Client,
    bearer: &str,
    url: &str,
) -> Result<String, FetchError> {
    let resp = client.get(url).bearer_auth(bearer).send().await?;
    match resp.status().as_u16() {
        429 => Err(FetchError::RateLimited),
        401 | 403 => Err(FetchError::Auth(format!("twitter api returned {}", resp.status()))),
        _ => resp
            .error_for_status()?
            .text()
            .await
            .map_err(FetchError::from),
    }
}

#[async_trait]
impl super::SourceAdapter for TwitterAdapter {
    async fn fetch(
        &self,
        source: &SourceConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<super::Fetched, FetchError> {
        let now = Utc::now();
        let body = match &self.mode {
            Mode::Fixture(json) => json.clone(),
            Mode::Http { client, bearer } => {
                let bearer = bearer
                    .as_deref()
                    .ok_or_else(|| FetchError::Auth("TWITTER_BEARER_TOKEN not set".into()))?;

                let user_url = format!("{API_BASE}/users/by/username/{}", source.endpoint);
                let user_body = get_json(client, bearer, &user_url).await?;
                let user: UserResponse = serde_json::from_str(&user_body)
                    .context("parsing twitter user json")
                    .map_err(FetchError::Parse)?;
                let user_id = user
                    .data
                    .ok_or_else(|| {
                        FetchError::Parse(anyhow::anyhow!("unknown account '{}'", source.endpoint))
                    })?
                    .id;

                let timeline_url = format!(
                    "{API_BASE}/users/{user_id}/tweets?max_results={}&tweet.fields=created_at,public_metrics&exclude=retweets,replies",
                    source.max_items.clamp(5, 100)
                );
                get_json(client, bearer, &timeline_url).await?
            }
        };
        parse_timeline(source, &body, now, since).map(super::Fetched::complete)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SocialTwitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;

    fn source() -> SourceConfig {
        SourceConfig {
            key: "tw-flamengo".into(),
            kind: SourceKind::SocialTwitter,
            endpoint: "Flamengo".into(),
            interval_minutes: 120,
            enabled: true,
            max_items: 10,
        }
    }

    #[test]
    fn timeline_parses_metrics_and_author() {
        let body = r#"{"data":[
            {"id":"1","text":"Gol do Mengo!","created_at":"2025-05-10T18:00:00Z",
             "public_metrics":{"like_count":100,"reply_count":5,"retweet_count":30}},
            {"id":"2","text":"Escalacao confirmada"}
        ]}"#;
        let items = parse_timeline(&source(), body, Utc::now(), None).unwrap();
        assert_eq!(items.len(), 2);
        let RawPayload::TweetPost {
            ref id,
            ref author,
            ref metrics,
            ..
        } = items[0].payload
        else {
            panic!("expected tweet payload");
        };
        assert_eq!(id, "1");
        assert_eq!(author, "Flamengo");
        assert_eq!(metrics.likes, 100);
        assert_eq!(metrics.shares, 30);
    }

    #[test]
    fn since_cursor_drops_old_tweets() {
        let body = r#"{"data":[
            {"id":"1","text":"velho","created_at":"2025-05-01T00:00:00Z"},
            {"id":"2","text":"novo","created_at":"2025-05-10T00:00:00Z"}
        ]}"#;
        let since = "2025-05-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let items = parse_timeline(&source(), body, Utc::now(), Some(since)).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        let err = parse_timeline(&source(), "<html>502</html>", Utc::now(), None).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
