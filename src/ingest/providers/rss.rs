// src/ingest/providers/rss.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::normalize_text;
use crate::ingest::types::{FeedEntry, FeedProvider};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// <guid isPermaLink="false">...</guid>
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// Parse a feed date: RFC 2822 (the RSS norm, with obsolete zones such as
/// `GMT`), then RFC 3339 as some feeds emit ISO stamps.
pub fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = OffsetDateTime::parse(ts, &Rfc2822) {
        return DateTime::from_timestamp(dt.unix_timestamp(), 0);
    }
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RSS 2.0 feed; the feed URL doubles as the source id.
pub struct RssFeed {
    source_id: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http(reqwest::Client),
}

impl RssFeed {
    /// Serve a fixed XML document, attributed to `source_id`.
    pub fn from_fixture(source_id: &str, content: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            mode: Mode::Fixture(content.to_string()),
        }
    }

    pub fn from_url(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("news-digest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            source_id: url.to_string(),
            mode: Mode::Http(client),
        })
    }

    pub fn parse_entries(source_id: &str, xml: &str) -> Result<Vec<FeedEntry>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let link = it
                .link
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty());
            let guid = it
                .guid
                .and_then(|g| g.value)
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty());
            let Some(unique_key) = link.clone().or(guid) else {
                tracing::debug!(source = source_id, "rss item without link or guid skipped");
                continue;
            };

            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            let description = normalize_text(it.description.as_deref().unwrap_or_default());
            if title.is_empty() && description.is_empty() {
                continue;
            }

            out.push(FeedEntry {
                source_id: source_id.to_string(),
                unique_key,
                title,
                description,
                link,
                published: it.pub_date.as_deref().and_then(parse_pub_date),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for RssFeed {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_entries(&self.source_id, s),
            Mode::Http(client) => {
                let resp = client
                    .get(&self.source_id)
                    .send()
                    .await
                    .with_context(|| format!("GET {}", self.source_id))?
                    .error_for_status()
                    .with_context(|| format!("GET {}", self.source_id))?;
                let body = resp.text().await.context("feed http .text()")?;
                Self::parse_entries(&self.source_id, &body)
            }
        }
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}

/// HTML entities that are not valid XML would abort the whole parse.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
