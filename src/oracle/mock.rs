//! Deterministic oracle for tests and `AI_TEST_MODE=mock` runs.
//!
//! Item sentiment comes from a small keyword list; digest sentiment is the
//! majority of the `Sentiment:` lines in the prompt body (ties -> Neutral).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{DigestAnalysis, ItemAnalysis, Oracle, OracleFuture};
use crate::error::OracleError;
use crate::models::{Sentiment, TierKind};

const POSITIVE_WORDS: &[&str] = &["surge", "rally", "gain", "approve", "record high"];
const NEGATIVE_WORDS: &[&str] = &["hack", "crash", "plunge", "lawsuit", "ban"];

#[derive(Default)]
pub struct MockOracle {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that answers every call with a transport error until [`set_failing(false)`](Self::set_failing).
    pub fn failing() -> Self {
        let m = Self::default();
        m.set_failing(true);
        m
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(OracleError::Transport("mock oracle failure".into()));
        }
        Ok(())
    }
}

fn field<'a>(input: &'a str, label: &str) -> Option<&'a str> {
    input
        .lines()
        .find_map(|l| l.strip_prefix(label))
        .map(str::trim)
}

fn keyword_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let pos = POSITIVE_WORDS.iter().any(|w| lower.contains(w));
    let neg = NEGATIVE_WORDS.iter().any(|w| lower.contains(w));
    match (pos, neg) {
        (true, false) => Sentiment::Positive,
        (false, true) => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

fn majority_sentiment(input: &str) -> (Sentiment, usize) {
    let (mut pos, mut neg, mut neu) = (0usize, 0usize, 0usize);
    for label in input.lines().filter_map(|l| l.strip_prefix("Sentiment:")) {
        match label.parse::<Sentiment>() {
            Ok(Sentiment::Positive) => pos += 1,
            Ok(Sentiment::Negative) => neg += 1,
            _ => neu += 1,
        }
    }
    let total = pos + neg + neu;
    let s = if pos > neg && pos > neu {
        Sentiment::Positive
    } else if neg > pos && neg > neu {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };
    (s, total)
}

impl Oracle for MockOracle {
    fn summarize_item<'a>(&'a self, input: &'a str) -> OracleFuture<'a, ItemAnalysis> {
        Box::pin(async move {
            self.begin()?;
            let title = field(input, "Title:").unwrap_or("untitled");
            Ok(ItemAnalysis {
                summary: vec![title.to_string()],
                sentiment: keyword_sentiment(input),
                verdict: "Mock verdict.".to_string(),
            })
        })
    }

    fn summarize_digest<'a>(
        &'a self,
        tier: TierKind,
        input: &'a str,
    ) -> OracleFuture<'a, DigestAnalysis> {
        Box::pin(async move {
            self.begin()?;
            let (sentiment, n) = majority_sentiment(input);
            Ok(DigestAnalysis {
                summary: vec![format!("{n} entries reviewed for the {tier} digest")],
                sentiment,
                verdict: "Mock verdict.".to_string(),
                trending_topics: vec![tier.as_str().to_string()],
            })
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
