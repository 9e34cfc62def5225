// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::ai::OracleConfig;

pub const ENV_CONFIG_PATH: &str = "NEWS_DIGEST_CONFIG";

pub const DEFAULT_FEEDS: &[&str] = &[
    "https://cointelegraph.com/rss",
    "https://www.coindesk.com/arc/outboundfeeds/rss/",
    "https://thedefiant.io/feed/",
];

pub const DEFAULT_DATABASE_URL: &str = "sqlite://news_digest.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub database_url: String,
    /// Feed URLs; each URL is also the source id for watermarking.
    pub feeds: Vec<String>,
    pub oracle: OracleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            feeds: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            oracle: OracleConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: PipelineConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        cfg.finish()
    }

    /// Load using env var + fallbacks:
    /// 1) $NEWS_DIGEST_CONFIG
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/pipeline.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/pipeline.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Self::default().finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.feeds = clean_feeds(self.feeds);
        if self.database_url.trim().is_empty() {
            return Err(anyhow!("database_url must not be empty"));
        }
        self.oracle = self.oracle.resolve()?;
        Ok(self)
    }
}

/// Trim, drop empties and repeated URLs; keeps the configured order.
fn clean_feeds(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|f| f == t) {
            out.push(t.to_string());
        }
    }
    out
}
