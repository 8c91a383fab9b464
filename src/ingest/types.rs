// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of external origin a source polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    NewsRss,
    NewsHtml,
    SocialTwitter,
    SocialInstagram,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::NewsRss => "news-rss",
            SourceKind::NewsHtml => "news-html",
            SourceKind::SocialTwitter => "social-twitter",
            SourceKind::SocialInstagram => "social-instagram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "news-rss" => Some(SourceKind::NewsRss),
            "news-html" => Some(SourceKind::NewsHtml),
            "social-twitter" => Some(SourceKind::SocialTwitter),
            "social-instagram" => Some(SourceKind::SocialInstagram),
            _ => None,
        }
    }
}

/// Engagement counters carried by social posts; zero for plain news.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
}

impl Engagement {
    pub fn is_zero(&self) -> bool {
        self.likes == 0 && self.comments == 0 && self.shares == 0
    }
}

/// Unprocessed fetch result for one external post/article. Lives only
/// within a single ingestion cycle; the normalizer is its sole consumer.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub source_key: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: RawPayload,
}

/// Source-kind-specific payload shapes. Downstream of the normalizer
/// nothing ever sees these; everything works on [`Record`].
#[derive(Debug, Clone)]
pub enum RawPayload {
    NewsEntry {
        guid: Option<String>,
        title: String,
        summary: String,
        link: Option<String>,
        published: Option<DateTime<Utc>>,
    },
    HtmlArticle {
        url: String,
        title: String,
        body: String,
    },
    TweetPost {
        id: String,
        text: String,
        author: String,
        created_at: Option<DateTime<Utc>>,
        metrics: Engagement,
    },
    InstaPost {
        id: String,
        caption: String,
        author: String,
        taken_at: Option<DateTime<Utc>>,
        metrics: Engagement,
    },
}

impl RawPayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            RawPayload::NewsEntry { .. } => SourceKind::NewsRss,
            RawPayload::HtmlArticle { .. } => SourceKind::NewsHtml,
            RawPayload::TweetPost { .. } => SourceKind::SocialTwitter,
            RawPayload::InstaPost { .. } => SourceKind::SocialInstagram,
        }
    }
}

/// Canonical, persisted unit of content. Append-only: immutable after
/// insert except for engagement-metric refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fingerprint: String,
    pub source_key: String,
    pub kind: SourceKind,
    pub title: String,
    pub body: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub engagement: Engagement,
    pub link: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Item tallies for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub fetched: u64,
    pub new: u64,
    pub duplicate: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "partial" => Some(RunStatus::Partial),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// One execution of the pipeline for one source. Finalized exactly once;
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: i64,
    pub source_key: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: RunCounts,
    pub status: RunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_through_str() {
        for k in [
            SourceKind::NewsRss,
            SourceKind::NewsHtml,
            SourceKind::SocialTwitter,
            SourceKind::SocialInstagram,
        ] {
            assert_eq!(SourceKind::parse(k.as_str()), Some(k));
        }
        assert_eq!(SourceKind::parse("rss"), None);
    }

    #[test]
    fn status_terminality() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Partial.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
