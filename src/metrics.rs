use std::path::Path;

use anyhow::Context;
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Process-wide Prometheus recorder. Batch runs have no scrape endpoint, so the
/// exposition is written to a textfile at exit instead.
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder. Fails if another recorder is already set.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// Stamp the run end time and write the exposition text to `path`.
    pub fn write_textfile(&self, path: &Path, finished_at_unix: i64) -> anyhow::Result<()> {
        gauge!("news_digest_last_run_timestamp_seconds").set(finished_at_unix as f64);
        std::fs::write(path, self.handle.render())
            .with_context(|| format!("writing metrics to {}", path.display()))
    }
}
