// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One candidate item as parsed from a feed, before dedup and summarization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub source_id: String,  // feed URL
    pub unique_key: String, // link, else guid
    pub title: String,      // normalized text
    pub description: String,
    pub link: Option<String>,
    /// Feed-provided publication time; `None` if absent or unparsable.
    pub published: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>>;
    fn source_id(&self) -> &str;
}
