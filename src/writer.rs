// src/writer.rs
//! Handoff to the article-writer collaborator.
//!
//! The pipeline's only obligation is delivery: every new record becomes a
//! [`WriterPayload`] pushed onto a bounded channel that a background task
//! drains. Prompt construction and article styling live behind the
//! [`ArticleWriter`] trait, outside the ingestion core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ingest::types::{Engagement, Record, SourceKind};

/// Editorial style the writer should produce. News gets the formal
/// treatment; social snippets read better casual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStyle {
    Formal,
    Casual,
    Social,
}

impl ArticleStyle {
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::NewsRss | SourceKind::NewsHtml => ArticleStyle::Formal,
            SourceKind::SocialTwitter => ArticleStyle::Social,
            SourceKind::SocialInstagram => ArticleStyle::Casual,
        }
    }
}

/// Normalized payload handed to the writer, one per new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterPayload {
    pub title: String,
    pub body: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub engagement: Engagement,
    pub style: ArticleStyle,
}

impl WriterPayload {
    pub fn from_record(record: &Record) -> Self {
        Self {
            title: record.title.clone(),
            body: record.body.clone(),
            author: record.author.clone(),
            published_at: record.published_at,
            engagement: record.engagement,
            style: ArticleStyle::for_kind(record.kind),
        }
    }
}

/// Structured article returned by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub headline: String,
    pub body: String,
    pub style: ArticleStyle,
}

#[async_trait]
pub trait ArticleWriter: Send + Sync {
    async fn write(&self, payload: WriterPayload) -> anyhow::Result<Article>;
}

/// Stand-in writer: logs the handoff and echoes the payload back as an
/// article. Useful until a real generation backend is wired in.
pub struct LoggingWriter;

#[async_trait]
impl ArticleWriter for LoggingWriter {
    async fn write(&self, payload: WriterPayload) -> anyhow::Result<Article> {
        info!(
            title = %payload.title,
            author = %payload.author,
            style = ?payload.style,
            "writer handoff"
        );
        Ok(Article {
            headline: payload.title,
            body: payload.body,
            style: payload.style,
        })
    }
}

/// Spawn the drain task. Failures are logged and counted, never fatal to
/// the pipeline.
pub fn spawn_writer_task<W: ArticleWriter + 'static>(
    writer: W,
    buffer: usize,
) -> (mpsc::Sender<WriterPayload>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<WriterPayload>(buffer);
    let handle = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = writer.write(payload).await {
                metrics::counter!("writer_errors_total").increment(1);
                warn!(error = %e, "article writer failed");
            } else {
                metrics::counter!("writer_articles_total").increment(1);
            }
        }
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_follows_source_kind() {
        assert_eq!(
            ArticleStyle::for_kind(SourceKind::NewsRss),
            ArticleStyle::Formal
        );
        assert_eq!(
            ArticleStyle::for_kind(SourceKind::SocialTwitter),
            ArticleStyle::Social
        );
        assert_eq!(
            ArticleStyle::for_kind(SourceKind::SocialInstagram),
            ArticleStyle::Casual
        );
    }

    #[tokio::test]
    async fn drain_task_consumes_payloads() {
        let (tx, handle) = spawn_writer_task(LoggingWriter, 8);
        let record = Record {
            fingerprint: "f".into(),
            source_key: "ge-globo".into(),
            kind: SourceKind::NewsRss,
            title: "Titulo".into(),
            body: "Corpo".into(),
            author: String::new(),
            published_at: None,
            engagement: Engagement::default(),
            link: None,
            scraped_at: Utc::now(),
        };
        tx.send(WriterPayload::from_record(&record)).await.unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
