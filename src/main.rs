//! news-digest: Binary Entrypoint
//! Loads config, wires the store and the oracle once, then runs ingestion
//! and/or the digest cascade and reports one line per source and tier.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_digest::config::PipelineConfig;
use news_digest::ingest::providers::RssFeed;
use news_digest::ingest::types::FeedProvider;
use news_digest::ingest::{IngestReport, Ingestor};
use news_digest::metrics::Metrics;
use news_digest::models::TierKind;
use news_digest::oracle::build_oracle_from_config;
use news_digest::orchestrator::{Orchestrator, RunSummary, TierReport};
use news_digest::store::{DynStore, SqliteStore};

const FEED_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "news-digest", version, about = "News ingestion and digest rollups")]
struct Cli {
    /// Pipeline config file (TOML or JSON). Defaults to $NEWS_DIGEST_CONFIG, then config/.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `database_url` from the config file.
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Write Prometheus exposition text here when the run ends.
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One ingestion pass over the configured feeds.
    Ingest,
    /// Build digests for one tier or, by default, the whole cascade.
    Digest {
        #[arg(value_enum, default_value_t = TierArg::All)]
        tier: TierArg,
        /// Reference date (YYYY-MM-DD); defaults to each tier's previous period.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Ingestion followed by daily, weekly and monthly digests.
    Run {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TierArg {
    Daily,
    Weekly,
    Monthly,
    All,
}

impl TierArg {
    fn tier(self) -> Option<TierKind> {
        match self {
            TierArg::Daily => Some(TierKind::Daily),
            TierArg::Weekly => Some(TierKind::Weekly),
            TierArg::Monthly => Some(TierKind::Monthly),
            TierArg::All => None,
        }
    }
}

/// RUST_LOG filter (default `news_digest=info,warn`); JSON lines with LOG_FORMAT=json.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_digest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut cfg = match &cli.config {
        Some(p) => PipelineConfig::load_from(p)?,
        None => PipelineConfig::load_default()?,
    };
    if let Some(url) = cli.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
        cfg.database_url = url.trim().to_string();
    }
    Ok(cfg)
}

fn build_providers(cfg: &PipelineConfig) -> anyhow::Result<Vec<Box<dyn FeedProvider>>> {
    cfg.feeds
        .iter()
        .map(|url| {
            RssFeed::from_url(url, FEED_TIMEOUT).map(|f| Box::new(f) as Box<dyn FeedProvider>)
        })
        .collect()
}

fn print_ingest(report: &IngestReport) {
    for s in &report.sources {
        match &s.error {
            Some(e) => println!("source {}: {} ({e})", s.source_id, s.status()),
            None => println!(
                "source {}: {} (fetched {}, stale {}, duplicates {}, ingested {}, failed {})",
                s.source_id,
                s.status(),
                s.fetched,
                s.stale,
                s.duplicates,
                s.ingested,
                s.failed_items
            ),
        }
    }
}

fn print_tiers(reports: &[TierReport]) {
    for r in reports {
        println!("{} digest: {}", r.tier, r.status);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let metrics = match &cli.metrics_file {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let cfg = load_config(&cli).context("invalid configuration")?;
    let store: DynStore = Arc::new(
        SqliteStore::connect(&cfg.database_url)
            .await
            .with_context(|| format!("opening store at {}", cfg.database_url))?,
    );
    let oracle = build_oracle_from_config(&cfg.oracle)?;
    info!(
        feeds = cfg.feeds.len(),
        oracle = oracle.provider_name(),
        "pipeline ready"
    );

    let now = Utc::now();
    let mut summary = RunSummary::default();

    match cli.command {
        Command::Ingest => {
            let providers = build_providers(&cfg)?;
            let report = Ingestor::new(store.clone(), oracle.clone())
                .run_once(&providers, now)
                .await;
            print_ingest(&report);
            summary.ingest = Some(report);
        }
        Command::Digest { tier, date } => {
            let orchestrator = Orchestrator::new(store.clone(), oracle.clone());
            summary.tiers = match tier.tier() {
                Some(t) => vec![orchestrator.run_tier(t, date, now).await],
                None => orchestrator.run_all(date, now).await,
            };
            print_tiers(&summary.tiers);
        }
        Command::Run { date } => {
            let providers = build_providers(&cfg)?;
            let report = Ingestor::new(store.clone(), oracle.clone())
                .run_once(&providers, now)
                .await;
            print_ingest(&report);
            summary.ingest = Some(report);

            summary.tiers = Orchestrator::new(store.clone(), oracle.clone())
                .run_all(date, now)
                .await;
            print_tiers(&summary.tiers);
        }
    }

    if let (Some(m), Some(path)) = (&metrics, &cli.metrics_file) {
        if let Err(e) = m.write_textfile(path, Utc::now().timestamp()) {
            warn!(error = ?e, "metrics textfile not written");
        }
    }

    Ok(ExitCode::from(summary.exit_code() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_without_tier_runs_every_tier() {
        let cli = Cli::try_parse_from(["news-digest", "digest"]).unwrap();
        match cli.command {
            Command::Digest { tier, date } => {
                assert_eq!(tier.tier(), None);
                assert!(date.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn digest_accepts_tier_and_date() {
        let cli =
            Cli::try_parse_from(["news-digest", "digest", "weekly", "--date", "2024-03-14"])
                .unwrap();
        match cli.command {
            Command::Digest { tier, date } => {
                assert_eq!(tier.tier(), Some(TierKind::Weekly));
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 14));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
