// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod oracle;
pub mod orchestrator;
pub mod rollup;
pub mod store;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::error::{OracleError, PipelineError, StoreError};
pub use crate::ingest::{IngestReport, Ingestor};
pub use crate::orchestrator::{Orchestrator, RunSummary, TierReport, TierStatus};
pub use crate::store::{DynStore, RecordStore, SqliteStore};
