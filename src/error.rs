//! Error taxonomy shared by the store, the oracle and the pipeline stages.
//!
//! Skips (duplicate item, digest already present, empty window) are *not*
//! errors; they are reported through the outcome types of each stage.

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures raised by a [`RecordStore`](crate::store::RecordStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database unreachable or query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back into its typed record.
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    /// JSON column could not be encoded/decoded.
    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn corrupt(table: &'static str, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            table,
            detail: detail.into(),
        }
    }
}

/// Failures raised by an [`Oracle`](crate::oracle::Oracle).
#[derive(Error, Debug)]
pub enum OracleError {
    /// Network round-trip failed or the provider answered with a non-2xx status.
    #[error("oracle transport failure: {0}")]
    Transport(String),

    /// Output did not match the expected structured shape.
    #[error("oracle output malformed: {0}")]
    Format(String),

    /// Oracle switched off in configuration.
    #[error("oracle is disabled")]
    Disabled,
}

/// Error surfaced by one unit of pipeline work (a source or a tier).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("feed unavailable: {0}")]
    Feed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Feed or store unreachable; retrying the run later is expected to help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Feed(_)
                | PipelineError::Store(StoreError::Database(_))
                | PipelineError::Oracle(OracleError::Transport(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(PipelineError::Feed("timeout".into()).is_transient());
        assert!(PipelineError::from(OracleError::Transport("502".into())).is_transient());
        assert!(!PipelineError::from(OracleError::Format("missing verdict".into())).is_transient());
        assert!(!PipelineError::from(StoreError::corrupt("news_items", "bad ts")).is_transient());
    }
}
