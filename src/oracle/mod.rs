//! Oracle adapter: structured summarization behind a trait object.
//!
//! Layering mirrors a transport/validator split:
//! * [`Completion`] does the remote call and returns raw text,
//! * [`StructuredOracle`] builds prompts, calls the transport once and
//!   validates the JSON into [`ItemAnalysis`] / [`DigestAnalysis`],
//! * [`MockOracle`] and [`DisabledOracle`] implement [`Oracle`] directly.

pub mod mock;
pub mod openai;
pub mod prompts;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use metrics::counter;
use serde::Deserialize;
use tracing::info;

use crate::config::ai::OracleConfig;
use crate::error::OracleError;
use crate::models::{Sentiment, TierKind};

pub use mock::MockOracle;
pub use openai::OpenAiProvider;

pub type OracleFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OracleError>> + Send + 'a>>;

/// Structured summary of one feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAnalysis {
    pub summary: Vec<String>,
    pub sentiment: Sentiment,
    pub verdict: String,
}

/// Structured summary of a digest bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestAnalysis {
    pub summary: Vec<String>,
    pub sentiment: Sentiment,
    pub verdict: String,
    pub trending_topics: Vec<String>,
}

pub trait Oracle: Send + Sync {
    fn summarize_item<'a>(&'a self, input: &'a str) -> OracleFuture<'a, ItemAnalysis>;
    fn summarize_digest<'a>(
        &'a self,
        tier: TierKind,
        input: &'a str,
    ) -> OracleFuture<'a, DigestAnalysis>;
    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynOracle = Arc<dyn Oracle>;

/// Low-level transport: one system+user exchange, raw text back.
pub trait Completion: Send + Sync + 'static {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> OracleFuture<'a, String>;
    fn name(&self) -> &'static str;
}

pub struct StructuredOracle<P: Completion> {
    inner: P,
}

impl<P: Completion> StructuredOracle<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: Completion> Oracle for StructuredOracle<P> {
    fn summarize_item<'a>(&'a self, input: &'a str) -> OracleFuture<'a, ItemAnalysis> {
        Box::pin(async move {
            counter!("oracle_calls_total", "kind" => "item").increment(1);
            let p = prompts::item_prompt(input);
            let raw = self.inner.complete(&p.system, &p.user).await?;
            parse_item_output(&raw)
        })
    }

    fn summarize_digest<'a>(
        &'a self,
        tier: TierKind,
        input: &'a str,
    ) -> OracleFuture<'a, DigestAnalysis> {
        Box::pin(async move {
            counter!("oracle_calls_total", "kind" => tier.as_str()).increment(1);
            let p = prompts::digest_prompt(tier, input);
            let raw = self.inner.complete(&p.system, &p.user).await?;
            parse_digest_output(&raw)
        })
    }

    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Fails every call; used when the oracle is switched off so tiers report
/// a failure instead of silently producing nothing.
pub struct DisabledOracle;

impl Oracle for DisabledOracle {
    fn summarize_item<'a>(&'a self, _input: &'a str) -> OracleFuture<'a, ItemAnalysis> {
        Box::pin(async { Err(OracleError::Disabled) })
    }
    fn summarize_digest<'a>(
        &'a self,
        _tier: TierKind,
        _input: &'a str,
    ) -> OracleFuture<'a, DigestAnalysis> {
        Box::pin(async { Err(OracleError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Factory: build an oracle according to config and environment.
///
/// * `AI_TEST_MODE=mock` returns the deterministic [`MockOracle`].
/// * `enabled == false` returns [`DisabledOracle`].
/// * `provider == "openai"` returns the OpenAI-backed [`StructuredOracle`].
pub fn build_oracle_from_config(cfg: &OracleConfig) -> anyhow::Result<DynOracle> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        info!("oracle: mock mode");
        return Ok(Arc::new(MockOracle::new()));
    }

    if !cfg.enabled {
        return Ok(Arc::new(DisabledOracle));
    }

    match cfg.provider.as_str() {
        "openai" => {
            let provider = OpenAiProvider::new(
                cfg.api_key.clone(),
                &cfg.model,
                Duration::from_secs(cfg.timeout_secs),
            )?;
            info!(model = %cfg.model, key_len = cfg.api_key.len(), "oracle: openai");
            Ok(Arc::new(StructuredOracle::new(provider)))
        }
        other => bail!("unsupported oracle provider: {other}"),
    }
}

// ------------------------------------------------------------
// Output parsing
// ------------------------------------------------------------

#[derive(Deserialize)]
struct RawItem {
    summary: Vec<String>,
    sentiment: String,
    verdict: String,
}

#[derive(Deserialize)]
struct RawDigest {
    summary: Vec<String>,
    sentiment: String,
    verdict: String,
    trending_topics: Vec<String>,
}

pub fn parse_item_output(raw: &str) -> Result<ItemAnalysis, OracleError> {
    let r: RawItem = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| OracleError::Format(format!("item output: {e}")))?;
    Ok(ItemAnalysis {
        summary: required_bullets(r.summary)?,
        sentiment: parse_sentiment(&r.sentiment)?,
        verdict: required_text("verdict", &r.verdict)?,
    })
}

pub fn parse_digest_output(raw: &str) -> Result<DigestAnalysis, OracleError> {
    let r: RawDigest = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| OracleError::Format(format!("digest output: {e}")))?;
    Ok(DigestAnalysis {
        summary: required_bullets(r.summary)?,
        sentiment: parse_sentiment(&r.sentiment)?,
        verdict: required_text("verdict", &r.verdict)?,
        trending_topics: trimmed(r.trending_topics),
    })
}

/// Models sometimes wrap JSON in a ```json fence despite instructions.
fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    match t.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => t,
    }
}

fn trimmed(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn required_bullets(items: Vec<String>) -> Result<Vec<String>, OracleError> {
    let out = trimmed(items);
    if out.is_empty() {
        return Err(OracleError::Format("summary has no bullet points".into()));
    }
    Ok(out)
}

fn required_text(field: &str, s: &str) -> Result<String, OracleError> {
    let t = s.trim();
    if t.is_empty() {
        return Err(OracleError::Format(format!("{field} is empty")));
    }
    Ok(t.to_string())
}

fn parse_sentiment(s: &str) -> Result<Sentiment, OracleError> {
    s.parse().map_err(OracleError::Format)
}
