//! Records persisted by the pipeline: source watermarks, news items and digests.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Closed sentiment label set shared by items and digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    /// Case-insensitive; surrounding whitespace and a trailing period are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().trim_end_matches('.');
        if t.eq_ignore_ascii_case("positive") {
            Ok(Sentiment::Positive)
        } else if t.eq_ignore_ascii_case("negative") {
            Ok(Sentiment::Negative)
        } else if t.eq_ignore_ascii_case("neutral") {
            Ok(Sentiment::Neutral)
        } else {
            Err(format!("unknown sentiment label {s:?}"))
        }
    }
}

/// Aggregation level of a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Daily,
    Weekly,
    Monthly,
}

impl TierKind {
    pub const ALL: [TierKind; 3] = [TierKind::Daily, TierKind::Weekly, TierKind::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Daily => "daily",
            TierKind::Weekly => "weekly",
            TierKind::Monthly => "monthly",
        }
    }

    /// Table holding this tier's digests.
    pub fn table(&self) -> &'static str {
        match self {
            TierKind::Daily => "daily_digests",
            TierKind::Weekly => "weekly_digests",
            TierKind::Monthly => "monthly_digests",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(TierKind::Daily),
            "weekly" => Ok(TierKind::Weekly),
            "monthly" => Ok(TierKind::Monthly),
            other => Err(format!("unknown digest tier {other:?} (daily|weekly|monthly)")),
        }
    }
}

/// Last-seen publication timestamp for one feed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub source_id: String,
    /// Unix seconds; 0 means "accept everything".
    pub last_seen: i64,
    pub updated_at: DateTime<Utc>,
}

/// A summarized feed item. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Dedup identity (item link, else guid).
    pub unique_key: String,
    pub title: String,
    pub source_id: String,
    pub body_summary: String,
    pub sentiment: Sentiment,
    pub verdict: String,
    pub created_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    /// `published_at` is the ingestion wall-clock time, not a feed-provided value.
    pub published_at_estimated: bool,
}

/// One digest row. The three tiers share the shape and differ in how
/// `bucket_key` / `period_*` are derived (see [`crate::window`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRecord {
    pub tier: TierKind,
    pub bucket_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub summary: String,
    pub sentiment: Sentiment,
    pub verdict: String,
    pub child_count: u32,
    pub sentiment_breakdown: BTreeMap<Sentiment, u32>,
    pub trending_topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Join oracle bullets into the persisted summary text.
pub fn bullet_text(bullets: &[String]) -> String {
    format!("• {}", bullets.join("\n• "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_parse_is_lenient_on_case_only() {
        assert_eq!("positive".parse::<Sentiment>(), Ok(Sentiment::Positive));
        assert_eq!(" NEGATIVE. ".parse::<Sentiment>(), Ok(Sentiment::Negative));
        assert!("Bullish".parse::<Sentiment>().is_err());
    }

    #[test]
    fn bullets_are_prefixed_and_newline_joined() {
        let b = vec!["BTC up".to_string(), "ETH flat".to_string()];
        assert_eq!(bullet_text(&b), "• BTC up\n• ETH flat");
    }

    #[test]
    fn breakdown_serializes_with_label_keys() {
        let mut m = BTreeMap::new();
        m.insert(Sentiment::Neutral, 2u32);
        m.insert(Sentiment::Positive, 1u32);
        let s = serde_json::to_string(&m).unwrap();
        assert_eq!(s, r#"{"Positive":1,"Neutral":2}"#);
    }
}
