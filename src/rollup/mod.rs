//! # Rollup Aggregator
//! One generic algorithm for all digest tiers. A [`Tier`] supplies the bucket
//! arithmetic, the default reference date and the child query; [`Rollup`]
//! does the rest:
//!
//! 1. bucket for the given or default reference date
//! 2. existence check by bucket key (before any range fetch or oracle call)
//! 3. ordered range fetch of child records
//! 4. empty window → skip, nothing persisted
//! 5. one oracle call over the rendered children
//! 6. sentiment breakdown over the children (sums to `child_count`)
//! 7. conflict-tolerant insert; any failure leaves no digest behind

pub mod tiers;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::error::{PipelineError, StoreResult};
use crate::models::{bullet_text, DigestRecord, NewsItem, Sentiment, TierKind};
use crate::oracle::DynOracle;
use crate::store::{DynStore, InsertOutcome, RecordStore};
use crate::window::Bucket;

pub use tiers::{Daily, Monthly, Weekly};

/// A record that can feed the tier above it.
pub trait RollupChild {
    fn sentiment(&self) -> Sentiment;
    /// Text block handed to the oracle.
    fn render(&self) -> String;
}

impl RollupChild for NewsItem {
    fn sentiment(&self) -> Sentiment {
        self.sentiment
    }

    fn render(&self) -> String {
        format!(
            "Title: {}\nSummary: {}\nSentiment: {}",
            self.title, self.body_summary, self.sentiment
        )
    }
}

impl RollupChild for DigestRecord {
    fn sentiment(&self) -> Sentiment {
        self.sentiment
    }

    fn render(&self) -> String {
        let heading = match self.tier {
            TierKind::Daily => format!("Date: {}", self.period_start),
            TierKind::Weekly => format!("Week: {} to {}", self.period_start, self.period_end),
            TierKind::Monthly => format!("Month: {}", self.bucket_key),
        };
        format!(
            "{heading}\nSummary: {}\nSentiment: {}\nVerdict: {}",
            self.summary, self.sentiment, self.verdict
        )
    }
}

/// Parameterization of the rollup for one tier.
#[async_trait]
pub trait Tier: Send + Sync {
    type Bucket: Bucket;
    type Child: RollupChild + Send + Sync;

    fn kind(&self) -> TierKind;
    fn bucket_for(&self, reference: NaiveDate) -> Self::Bucket;
    /// Reference date used when the caller gives none.
    fn default_reference(&self, today: NaiveDate) -> NaiveDate;
    /// Children inside `bucket`, ordered by their natural time key.
    async fn fetch_children(
        &self,
        store: &dyn RecordStore,
        bucket: &Self::Bucket,
    ) -> StoreResult<Vec<Self::Child>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollupOutcome {
    Created(DigestRecord),
    /// A digest for this bucket was already stored.
    AlreadyExists { bucket_key: String },
    /// No children in the window.
    NoData { bucket_key: String },
}

/// Count children per sentiment label.
pub fn sentiment_breakdown<I>(labels: I) -> BTreeMap<Sentiment, u32>
where
    I: IntoIterator<Item = Sentiment>,
{
    let mut out = BTreeMap::new();
    for s in labels {
        *out.entry(s).or_insert(0u32) += 1;
    }
    out
}

pub struct Rollup<T: Tier> {
    tier: T,
    store: DynStore,
    oracle: DynOracle,
}

impl<T: Tier> Rollup<T> {
    pub fn new(tier: T, store: DynStore, oracle: DynOracle) -> Self {
        Self {
            tier,
            store,
            oracle,
        }
    }

    pub fn kind(&self) -> TierKind {
        self.tier.kind()
    }

    pub async fn run(
        &self,
        reference: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<RollupOutcome, PipelineError> {
        let kind = self.tier.kind();
        let reference = reference.unwrap_or_else(|| self.tier.default_reference(now.date_naive()));
        let bucket = self.tier.bucket_for(reference);
        let bucket_key = bucket.key();

        if self.store.find_digest(kind, &bucket_key).await?.is_some() {
            info!(tier = %kind, bucket = %bucket_key, "digest already exists, skipping");
            return Ok(RollupOutcome::AlreadyExists { bucket_key });
        }

        let children = self.tier.fetch_children(self.store.as_ref(), &bucket).await?;
        if children.is_empty() {
            info!(tier = %kind, bucket = %bucket_key, "no child records in window");
            return Ok(RollupOutcome::NoData { bucket_key });
        }
        info!(tier = %kind, bucket = %bucket_key, children = children.len(), "rolling up");

        let body = children
            .iter()
            .map(RollupChild::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        let analysis = self.oracle.summarize_digest(kind, &body).await?;

        let record = DigestRecord {
            tier: kind,
            bucket_key: bucket_key.clone(),
            period_start: bucket.first_day(),
            period_end: bucket.last_day(),
            summary: bullet_text(&analysis.summary),
            sentiment: analysis.sentiment,
            verdict: analysis.verdict,
            child_count: children.len() as u32,
            sentiment_breakdown: sentiment_breakdown(children.iter().map(RollupChild::sentiment)),
            trending_topics: analysis.trending_topics,
            created_at: now,
        };

        match self.store.insert_digest(&record).await? {
            InsertOutcome::Inserted => {
                info!(
                    tier = %kind,
                    bucket = %bucket_key,
                    sentiment = %record.sentiment,
                    topics = ?record.trending_topics.iter().take(3).collect::<Vec<_>>(),
                    "digest created"
                );
                Ok(RollupOutcome::Created(record))
            }
            InsertOutcome::AlreadyExists => {
                // Another run inserted between our check and our insert.
                warn!(tier = %kind, bucket = %bucket_key, "digest appeared concurrently");
                Ok(RollupOutcome::AlreadyExists { bucket_key })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_counts_sum_to_len() {
        let labels = vec![
            Sentiment::Positive,
            Sentiment::Neutral,
            Sentiment::Positive,
            Sentiment::Negative,
        ];
        let b = sentiment_breakdown(labels.iter().copied());
        assert_eq!(b.get(&Sentiment::Positive), Some(&2));
        assert_eq!(b.values().sum::<u32>(), labels.len() as u32);
    }

    #[test]
    fn weekly_child_render_uses_week_heading() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let rec = DigestRecord {
            tier: TierKind::Weekly,
            bucket_key: "2024-03-11/2024-03-17".into(),
            period_start: d("2024-03-11"),
            period_end: d("2024-03-17"),
            summary: "• x".into(),
            sentiment: Sentiment::Negative,
            verdict: "v".into(),
            child_count: 3,
            sentiment_breakdown: BTreeMap::new(),
            trending_topics: vec![],
            created_at: Utc::now(),
        };
        let r = rec.render();
        assert!(r.starts_with("Week: 2024-03-11 to 2024-03-17\n"));
        assert!(r.contains("Sentiment: Negative\nVerdict: v"));
    }
}
