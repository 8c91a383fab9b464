// src/ingest/providers/mod.rs
//! One adapter per source kind. Adapters keep no state between calls;
//! the scheduler passes in the config and the since-cursor.

pub mod html;
pub mod instagram;
pub mod rss;
pub mod twitter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingest::types::{RawItem, SourceKind};

/// Result of one adapter fetch. `interrupted` is set when the adapter
/// errored mid-stream after already collecting some items; the scheduler
/// turns that into a `partial` run.
#[derive(Debug, Default)]
pub struct Fetched {
    pub items: Vec<RawItem>,
    pub interrupted: Option<FetchError>,
}

impl Fetched {
    pub fn complete(items: Vec<RawItem>) -> Self {
        Self {
            items,
            interrupted: None,
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Pulls raw items for one source. An empty result is success; a
    /// `FetchError` means nothing usable came back at all.
    async fn fetch(
        &self,
        source: &SourceConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<Fetched, FetchError>;

    fn kind(&self) -> SourceKind;
}

/// Shared HTTP client with a bounded per-call timeout so one slow source
/// cannot stall the tick loop.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent(concat!("futfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("reqwest client")
}

/// Default adapter wiring used by the scheduler.
pub fn adapter_for(kind: SourceKind, client: &reqwest::Client) -> Box<dyn SourceAdapter> {
    match kind {
        SourceKind::NewsRss => Box::new(rss::RssAdapter::from_http(client.clone())),
        SourceKind::NewsHtml => Box::new(html::HtmlAdapter::new(client.clone())),
        SourceKind::SocialTwitter => Box::new(twitter::TwitterAdapter::from_env(client.clone())),
        SourceKind::SocialInstagram => {
            Box::new(instagram::InstagramAdapter::from_env(client.clone()))
        }
    }
}
