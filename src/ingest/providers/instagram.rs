// src/ingest/providers/instagram.rs
//! Instagram adapter. Pulls an account's recent posts from the web feed
//! endpoint using a session cookie; without a session the fetch fails as
//! an auth error so the scheduler backs off instead of hammering the
//! login wall.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingest::types::{Engagement, RawItem, RawPayload, SourceKind};

const ENV_SESSION: &str = "INSTAGRAM_SESSION_ID";

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    items: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    #[serde(default)]
    caption: Option<Caption>,
    /// Unix seconds.
    taken_at: Option<i64>,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    comment_count: u64,
    user: Option<PostUser>,
}

#[derive(Debug, Deserialize)]
struct Caption {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct PostUser {
    username: String,
}

pub struct InstagramAdapter {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        session_id: Option<String>,
    },
}

impl InstagramAdapter {
    pub fn from_fixture(feed_json: &str) -> Self {
        Self {
            mode: Mode::Fixture(feed_json.to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                client,
                session_id: std::env::var(ENV_SESSION).ok(),
            },
        }
    }
}

/// Parse a feed response body into raw items.
pub fn parse_posts(
    source: &SourceConfig,
    body: &str,
    fetched_at: DateTime<Utc>,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<RawItem>, FetchError> {
    let resp: FeedResponse = serde_json::from_str(body)
        .context("parsing instagram feed json")
        .map_err(FetchError::Parse)?;

    let mut out = Vec::with_capacity(resp.items.len());
    for post in resp.items {
        let taken_at = post
            .taken_at
            .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0));
        if let (Some(since), Some(at)) = (since, taken_at) {
            if at <= since {
                continue;
            }
        }
        let author = post
            .user
            .map(|u| u.username)
            .unwrap_or_else(|| source.endpoint.clone());
        out.push(RawItem {
            source_key: source.key.clone(),
            fetched_at,
            payload: RawPayload::InstaPost {
                id: post.id,
                caption: post.caption.map(|c| c.text).unwrap_or_default(),
                author,
                taken_at,
                metrics: Engagement {
                    likes: post.like_count,
                    comments: post.comment_count,
                    shares: 0,
                },
            },
        });
        if out.len() >= source.max_items {
            break;
        }
    }
    Ok(out)
}

#[async_trait]
impl super::SourceAdapter for InstagramAdapter {
    async fn fetch(
        &self,
        source: &SourceConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<super::Fetched, FetchError> {
        let now = Utc::now();
        let body = match &self.mode {
            Mode::Fixture(json) => json.clone(),
            Mode::Http { client, session_id } => {
                let session = session_id
                    .as_deref()
                    .ok_or_else(|| FetchError::Auth("INSTAGRAM_SESSION_ID not set".into()))?;
                let url = format!(
                    "https://i.instagram.com/api/v1/feed/user/{}/username/",
                    source.endpoint
                );
                let resp = client
                    .get(&url)
                    .header("Cookie", format!("sessionid={session}"))
                    .send()
                    .await?;
                match resp.status().as_u16() {
                    429 => return Err(FetchError::RateLimited),
                    401 | 403 => {
                        return Err(FetchError::Auth("instagram session rejected".into()))
                    }
                    _ => resp
                        .error_for_status()?
                        .text()
                        .await
                        .map_err(FetchError::from)?,
                }
            }
        };
        parse_posts(source, &body, now, since).map(super::Fetched::complete)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SocialInstagram
    }
}
