// src/ingest/providers/html.rs
//! HTML-scrape adapter for news sites without a usable feed.
//!
//! Two-phase, like any polite scraper: index the listing page for article
//! links, then fetch each article and pull title/body out of the usual
//! tags. A failed article fetch does not sink the batch; a rate limit
//! mid-stream stops the run and reports it as interrupted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingest::types::{RawItem, RawPayload, SourceKind};

pub struct HtmlAdapter {
    client: reqwest::Client,
}

impl HtmlAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Extract article links from a listing page, resolved against `base`.
/// Order is preserved; duplicates and cross-host links are dropped.
pub fn parse_index(base: &Url, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("article a[href], h1 a[href], h2 a[href], h3 a[href]")
        .expect("static selector");

    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.host_str() != base.host_str() {
            continue;
        }
        let s = resolved.to_string();
        if seen.insert(s.clone()) {
            urls.push(s);
        }
    }
    urls
}

/// Extract title and body paragraphs from one article page. Returns
/// `None` when the page has no usable text.
pub fn parse_article(url: &str, html: &str) -> Option<RawPayload> {
    let document = Html::parse_document(html);
    let title_sel = Selector::parse("h1").expect("static selector");
    let body_sel = Selector::parse("article p, .content p, .post-content p, main p")
        .expect("static selector");

    let title = document
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    let mut body = String::new();
    for p in document.select(&body_sel) {
        let text = p.text().collect::<Vec<_>>().join(" ");
        if !text.trim().is_empty() {
            body.push_str(text.trim());
            body.push('\n');
        }
    }

    if title.trim().is_empty() && body.trim().is_empty() {
        return None;
    }
    Some(RawPayload::HtmlArticle {
        url: url.to_string(),
        title,
        body,
    })
}

#[async_trait]
impl super::SourceAdapter for HtmlAdapter {
    async fn fetch(
        &self,
        source: &SourceConfig,
        _since: Option<DateTime<Utc>>,
    ) -> Result<super::Fetched, FetchError> {
        let base = Url::parse(&source.endpoint)
            .map_err(|e| FetchError::Parse(anyhow::anyhow!("bad index url: {e}")))?;

        let index_html = self
            .client
            .get(base.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .map_err(FetchError::from)?;

        let urls = parse_index(&base, &index_html);
        debug!(source = %source.key, count = urls.len(), "indexed article urls");

        let now = Utc::now();
        let mut items = Vec::new();
        let mut interrupted = None;
        for url in urls.into_iter().take(source.max_items) {
            match self.fetch_article(&url).await {
                Ok(Some(payload)) => items.push(RawItem {
                    source_key: source.key.clone(),
                    fetched_at: now,
                    payload,
                }),
                Ok(None) => {
                    warn!(source = %source.key, %url, "article page had no content");
                }
                // Back-off errors stop the stream; transient ones just
                // skip this article.
                Err(e) if e.should_back_off() => {
                    interrupted = Some(e);
                    break;
                }
                Err(e) => {
                    warn!(source = %source.key, %url, error = %e, "article fetch failed");
                }
            }
        }

        if items.is_empty() {
            if let Some(e) = interrupted {
                return Err(e);
            }
        }
        Ok(super::Fetched { items, interrupted })
    }

    fn kind(&self) -> SourceKind {
        SourceKind::NewsHtml
    }
}

impl HtmlAdapter {
    async fn fetch_article(&self, url: &str) -> Result<Option<RawPayload>, FetchError> {
        let resp = self.client.get(url).send().await?;
        if resp.status().as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        let body = resp.error_for_status()?.text().await.map_err(FetchError::from)?;
        Ok(parse_article(url, &body))
    }
}
