//! Persistent record store abstraction.
//!
//! The store is the only shared mutable resource and the single source of
//! truth: components look records up by key or by ordered range on every run
//! and never keep copies across runs.

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreResult;
use crate::models::{DigestRecord, NewsItem, TierKind, Watermark};

pub use sqlite::SqliteStore;

/// Result of a conflict-tolerant insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key was already present; nothing was written.
    AlreadyExists,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- source watermarks ---
    async fn watermark(&self, source_id: &str) -> StoreResult<Option<Watermark>>;
    /// Upsert keyed by `source_id`. The stored value never decreases.
    async fn upsert_watermark(
        &self,
        source_id: &str,
        last_seen: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    // --- news items ---
    async fn find_item(&self, unique_key: &str) -> StoreResult<Option<NewsItem>>;
    async fn insert_item(&self, item: &NewsItem) -> StoreResult<InsertOutcome>;
    /// Items with `start <= published_at < end`, oldest first.
    async fn items_published_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<NewsItem>>;

    // --- digests ---
    async fn find_digest(&self, tier: TierKind, bucket_key: &str)
        -> StoreResult<Option<DigestRecord>>;
    /// Digests of `tier` whose whole period lies in `[first_day, last_day]`, ordered by period start.
    async fn digests_within(
        &self,
        tier: TierKind,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> StoreResult<Vec<DigestRecord>>;
    async fn insert_digest(&self, digest: &DigestRecord) -> StoreResult<InsertOutcome>;
}

/// Convenient alias used by callers.
pub type DynStore = Arc<dyn RecordStore>;
