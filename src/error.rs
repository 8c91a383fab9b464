//! Typed errors for the ingestion pipeline.

use thiserror::Error;

/// Adapter-level failure while pulling from an external source.
///
/// Rate-limit and auth rejections back off for the remainder of the run;
/// transient network failures are retried on the next scheduler tick.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connect, timeout). Retryable next tick.
    #[error("transient fetch error: {0}")]
    Transient(#[source] anyhow::Error),

    /// Upstream rate limit hit (HTTP 429 or equivalent).
    #[error("rate limited by source")]
    RateLimited,

    /// Credentials missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Upstream responded, but the payload could not be parsed.
    #[error("malformed upstream payload: {0}")]
    Parse(#[source] anyhow::Error),
}

impl FetchError {
    /// Whether the source should be left alone for the rest of the run
    /// rather than retried immediately.
    pub fn should_back_off(&self) -> bool {
        matches!(self, FetchError::RateLimited | FetchError::Auth(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.status().map(|s| s.as_u16()) == Some(429) {
            return FetchError::RateLimited;
        }
        if e.status().is_some_and(|s| s == 401 || s == 403) {
            return FetchError::Auth(e.to_string());
        }
        FetchError::Transient(e.into())
    }
}

/// A single raw item could not be turned into a canonical record.
/// Always item-local: tallied on the run, never aborts it.
#[derive(Debug, Error)]
#[error("cannot normalize item from '{source_key}': {reason}")]
pub struct NormalizeError {
    pub source_key: String,
    pub reason: String,
}

impl NormalizeError {
    pub fn new(source_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            reason: reason.into(),
        }
    }
}

/// Dedup store failure. Run-fatal: the run is marked `failed`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_split_matches_taxonomy() {
        assert!(FetchError::RateLimited.should_back_off());
        assert!(FetchError::Auth("no token".into()).should_back_off());
        assert!(!FetchError::Transient(anyhow::anyhow!("connect refused")).should_back_off());
        assert!(!FetchError::Parse(anyhow::anyhow!("bad xml")).should_back_off());
    }
}
