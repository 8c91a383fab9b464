//! Source configuration: which feeds/accounts to poll and how often.
//!
//! The file is re-read on every scheduler tick, so edits (new sources,
//! changed intervals, disabled sources) take effect without a restart.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::SourceKind;

const ENV_PATH: &str = "FUTFEED_SOURCES_PATH";

fn default_interval_minutes() -> u64 {
    60
}
fn default_max_items() -> usize {
    25
}
fn default_enabled() -> bool {
    true
}

/// One configured external origin. Sources are disabled, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique key, e.g. "ge-globo" or "tw-flamengo".
    pub key: String,
    pub kind: SourceKind,
    /// Feed URL, index-page URL, or account handle depending on kind.
    pub endpoint: String,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load sources using env var + fallbacks:
/// 1) $FUTFEED_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_sources_default() -> Result<Vec<SourceConfig>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("FUTFEED_SOURCES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceConfig>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<SourceConfig>> {
    let v: SourcesFile = toml::from_str(s)?;
    validate(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceConfig>> {
    let v: Vec<SourceConfig> = serde_json::from_str(s)?;
    validate(v)
}

/// Reject empty/duplicate keys and zero intervals; keep file order otherwise.
fn validate(items: Vec<SourceConfig>) -> Result<Vec<SourceConfig>> {
    use std::collections::HashSet;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut sc in items {
        sc.key = sc.key.trim().to_string();
        sc.endpoint = sc.endpoint.trim().to_string();
        if sc.key.is_empty() || sc.endpoint.is_empty() {
            return Err(anyhow!("source with empty key or endpoint"));
        }
        if !seen.insert(sc.key.clone()) {
            return Err(anyhow!("duplicate source key '{}'", sc.key));
        }
        if sc.interval_minutes == 0 {
            return Err(anyhow!("source '{}' has zero interval", sc.key));
        }
        out.push(sc);
    }
    Ok(out)
}
