//! Per-source watermark: the newest publication time already processed.
//!
//! Purely an optimization that spares fetch-side oracle calls on old items;
//! the [`Deduplicator`](super::dedup::Deduplicator) is what guarantees
//! correctness when a watermark is stale or reset.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreResult;
use crate::store::DynStore;

pub struct WatermarkTracker {
    store: DynStore,
}

impl WatermarkTracker {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Stored value, `None` for a source never seen before.
    pub async fn current(&self, source_id: &str) -> StoreResult<Option<i64>> {
        Ok(self.store.watermark(source_id).await?.map(|w| w.last_seen))
    }

    /// Unix seconds of the last processed item; 0 when the source is unknown.
    pub async fn get_watermark(&self, source_id: &str) -> StoreResult<i64> {
        Ok(self.current(source_id).await?.unwrap_or(0))
    }

    /// Move the watermark forward to `ts`. Never regresses; returns whether it moved.
    pub async fn advance_watermark(
        &self,
        source_id: &str,
        ts: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let current = self.get_watermark(source_id).await?;
        if ts <= current {
            return Ok(false);
        }
        self.store.upsert_watermark(source_id, ts, now).await?;
        Ok(true)
    }

    /// Persist the end of one source run with at most one upsert.
    ///
    /// `stored` is what [`current`](Self::current) returned at the start of the
    /// run. A new source gets its row here, at `target` or 0. Returns the new
    /// value when the watermark moved.
    pub async fn commit(
        &self,
        source_id: &str,
        stored: Option<i64>,
        target: Option<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<i64>> {
        let base = stored.unwrap_or(0);
        match target.filter(|t| *t > base) {
            Some(t) => {
                self.store.upsert_watermark(source_id, t, now).await?;
                Ok(Some(t))
            }
            None if stored.is_none() => {
                self.store.upsert_watermark(source_id, 0, now).await?;
                debug!(source = source_id, "watermark initialized");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
