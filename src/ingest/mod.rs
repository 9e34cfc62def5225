// src/ingest/mod.rs
pub mod dedup;
pub mod providers;
pub mod types;
pub mod watermark;

use std::fmt;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::ingest::dedup::Deduplicator;
use crate::ingest::types::{FeedEntry, FeedProvider};
use crate::ingest::watermark::WatermarkTracker;
use crate::models::NewsItem;
use crate::oracle::DynOracle;
use crate::store::{DynStore, InsertOutcome};

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Entries parsed from feeds.");
        describe_counter!(
            "ingest_items_total",
            "Feed entries by outcome (stored, duplicate, stale, failed)."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Sources whose fetch or watermark access failed."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars (keeps oracle prompts bounded)
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Per-source outcome, always reported (nothing fails silently).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Ingested,
    NothingNew,
    Failed,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceStatus::Ingested => "ingested",
            SourceStatus::NothingNew => "nothing new",
            SourceStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub source_id: String,
    pub fetched: usize,
    /// At or below the watermark; never reached dedup or the oracle.
    pub stale: usize,
    pub duplicates: usize,
    pub ingested: usize,
    pub failed_items: usize,
    /// New watermark when it moved this run.
    pub watermark: Option<i64>,
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            ..Default::default()
        }
    }

    pub fn status(&self) -> SourceStatus {
        if self.error.is_some() || self.failed_items > 0 {
            SourceStatus::Failed
        } else if self.ingested > 0 {
            SourceStatus::Ingested
        } else {
            SourceStatus::NothingNew
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub sources: Vec<SourceReport>,
}

impl IngestReport {
    pub fn ingested(&self) -> usize {
        self.sources.iter().map(|s| s.ingested).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.sources
            .iter()
            .any(|s| s.status() == SourceStatus::Failed)
    }
}

enum EntryOutcome {
    Stored,
    Duplicate,
}

/// Fetch → watermark filter → dedup → oracle → insert → advance watermark.
pub struct Ingestor {
    store: DynStore,
    oracle: DynOracle,
    watermarks: WatermarkTracker,
    dedup: Deduplicator,
}

impl Ingestor {
    pub fn new(store: DynStore, oracle: DynOracle) -> Self {
        Self {
            watermarks: WatermarkTracker::new(store.clone()),
            dedup: Deduplicator::new(store.clone()),
            store,
            oracle,
        }
    }

    /// Process every provider in order; a failing source never stops the others.
    pub async fn run_once(
        &self,
        providers: &[Box<dyn FeedProvider>],
        now: DateTime<Utc>,
    ) -> IngestReport {
        ensure_metrics_described();

        let mut report = IngestReport::default();
        for p in providers {
            let r = self.ingest_source(p.as_ref(), now).await;
            info!(
                source = %r.source_id,
                status = %r.status(),
                fetched = r.fetched,
                stale = r.stale,
                duplicates = r.duplicates,
                ingested = r.ingested,
                failed = r.failed_items,
                "source processed"
            );
            report.sources.push(r);
        }
        report
    }

    pub async fn ingest_source(
        &self,
        provider: &dyn FeedProvider,
        now: DateTime<Utc>,
    ) -> SourceReport {
        let source = provider.source_id();
        let mut report = SourceReport::new(source);

        let stored = match self.watermarks.current(source).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, source, "watermark lookup failed");
                counter!("ingest_source_errors_total").increment(1);
                report.error = Some(PipelineError::from(e).to_string());
                return report;
            }
        };

        let entries = match provider.fetch_entries().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = ?e, source, "feed fetch failed");
                counter!("ingest_source_errors_total").increment(1);
                report.error = Some(PipelineError::Feed(format!("{e:#}")).to_string());
                return report;
            }
        };
        report.fetched = entries.len();
        let last_seen = stored.unwrap_or(0);

        let mut done_ts: Vec<i64> = Vec::new();
        let mut earliest_failure: Option<i64> = None;

        for entry in entries {
            let ts = entry.published.map(|d| d.timestamp());
            if ts.is_some_and(|t| t <= last_seen) {
                report.stale += 1;
                counter!("ingest_items_total", "outcome" => "stale").increment(1);
                continue;
            }

            match self.ingest_entry(&entry, now).await {
                Ok(EntryOutcome::Stored) => {
                    report.ingested += 1;
                    counter!("ingest_items_total", "outcome" => "stored").increment(1);
                }
                Ok(EntryOutcome::Duplicate) => {
                    report.duplicates += 1;
                    counter!("ingest_items_total", "outcome" => "duplicate").increment(1);
                }
                Err(e) => {
                    warn!(error = %e, source, key = %entry.unique_key, "item failed");
                    counter!("ingest_items_total", "outcome" => "failed").increment(1);
                    report.failed_items += 1;
                    if let Some(t) = ts {
                        earliest_failure = Some(earliest_failure.map_or(t, |f| f.min(t)));
                    }
                    continue;
                }
            }
            if let Some(t) = ts {
                done_ts.push(t);
            }
        }

        // The watermark must stay below any item that failed, so the next run retries it.
        let target = done_ts
            .into_iter()
            .filter(|t| earliest_failure.map_or(true, |f| *t < f))
            .max();
        match self.watermarks.commit(source, stored, target, now).await {
            Ok(moved) => report.watermark = moved,
            Err(e) => {
                warn!(error = %e, source, "watermark advance failed");
                report.error = Some(format!("watermark advance failed: {e}"));
            }
        }

        report
    }

    async fn ingest_entry(
        &self,
        entry: &FeedEntry,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome, PipelineError> {
        if !self.dedup.should_ingest(&entry.unique_key).await? {
            return Ok(EntryOutcome::Duplicate);
        }

        let input = format!(
            "Title: {}\nSummary: {}\nURL: {}",
            entry.title,
            entry.description,
            entry.link.as_deref().unwrap_or(&entry.unique_key)
        );
        let analysis = self.oracle.summarize_item(&input).await?;

        let (published_at, published_at_estimated) = match entry.published {
            Some(p) => (p, false),
            None => (now, true),
        };
        let item = NewsItem {
            unique_key: entry.unique_key.clone(),
            title: entry.title.clone(),
            source_id: entry.source_id.clone(),
            body_summary: crate::models::bullet_text(&analysis.summary),
            sentiment: analysis.sentiment,
            verdict: analysis.verdict,
            created_at: now,
            published_at,
            published_at_estimated,
        };

        match self.store.insert_item(&item).await? {
            InsertOutcome::Inserted => Ok(EntryOutcome::Stored),
            InsertOutcome::AlreadyExists => Ok(EntryOutcome::Duplicate),
        }
    }
}
