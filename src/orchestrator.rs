//! Runs the digest cascade: daily, then weekly, then monthly.
//!
//! Each tier reads only what earlier tiers have already committed, so the
//! ordering matters. A failure in one tier is reported and the next tier
//! still runs; it simply sees whatever children exist.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{error, info};

use crate::ingest::IngestReport;
use crate::models::TierKind;
use crate::oracle::DynOracle;
use crate::rollup::{Daily, Monthly, Rollup, RollupOutcome, Weekly};
use crate::store::DynStore;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "rollup_runs_total",
            "Rollup runs by tier and status (created, exists, no_data, failed)."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierStatus {
    Created { bucket_key: String, child_count: u32 },
    AlreadyExists { bucket_key: String },
    NoData { bucket_key: String },
    Failed { error: String },
}

impl TierStatus {
    fn label(&self) -> &'static str {
        match self {
            TierStatus::Created { .. } => "created",
            TierStatus::AlreadyExists { .. } => "exists",
            TierStatus::NoData { .. } => "no_data",
            TierStatus::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for TierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierStatus::Created {
                bucket_key,
                child_count,
            } => write!(f, "created {bucket_key} from {child_count} records"),
            TierStatus::AlreadyExists { bucket_key } => {
                write!(f, "skipped {bucket_key}: already exists")
            }
            TierStatus::NoData { bucket_key } => write!(f, "skipped {bucket_key}: no data"),
            TierStatus::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierReport {
    pub tier: TierKind,
    pub status: TierStatus,
}

/// Everything one invocation did; drives the process exit code.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ingest: Option<IngestReport>,
    pub tiers: Vec<TierReport>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.ingest.as_ref().is_some_and(|r| r.has_failures())
            || self
                .tiers
                .iter()
                .any(|t| matches!(t.status, TierStatus::Failed { .. }))
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }
}

pub struct Orchestrator {
    daily: Rollup<Daily>,
    weekly: Rollup<Weekly>,
    monthly: Rollup<Monthly>,
}

impl Orchestrator {
    pub fn new(store: DynStore, oracle: DynOracle) -> Self {
        Self {
            daily: Rollup::new(Daily, store.clone(), oracle.clone()),
            weekly: Rollup::new(Weekly, store.clone(), oracle.clone()),
            monthly: Rollup::new(Monthly, store, oracle),
        }
    }

    /// Run a single tier. `reference` of `None` means the tier's default window.
    pub async fn run_tier(
        &self,
        tier: TierKind,
        reference: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> TierReport {
        ensure_metrics_described();

        let result = match tier {
            TierKind::Daily => self.daily.run(reference, now).await,
            TierKind::Weekly => self.weekly.run(reference, now).await,
            TierKind::Monthly => self.monthly.run(reference, now).await,
        };
        let status = match result {
            Ok(RollupOutcome::Created(rec)) => TierStatus::Created {
                bucket_key: rec.bucket_key,
                child_count: rec.child_count,
            },
            Ok(RollupOutcome::AlreadyExists { bucket_key }) => {
                TierStatus::AlreadyExists { bucket_key }
            }
            Ok(RollupOutcome::NoData { bucket_key }) => TierStatus::NoData { bucket_key },
            Err(e) => {
                error!(tier = %tier, error = %e, transient = e.is_transient(), "rollup failed");
                TierStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        counter!("rollup_runs_total", "tier" => tier.as_str(), "status" => status.label())
            .increment(1);
        info!(tier = %tier, status = %status, "tier finished");
        TierReport { tier, status }
    }

    /// Daily, weekly, monthly in that order. All tiers share `reference` when given.
    pub async fn run_all(
        &self,
        reference: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Vec<TierReport> {
        let mut out = Vec::with_capacity(TierKind::ALL.len());
        for tier in TierKind::ALL {
            out.push(self.run_tier(tier, reference, now).await);
        }
        out
    }
}
