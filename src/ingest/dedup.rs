//! Existence check by `unique_key`, run once per candidate before the oracle.

use crate::error::StoreResult;
use crate::store::DynStore;

pub struct Deduplicator {
    store: DynStore,
}

impl Deduplicator {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// `false` when an item with this key is already stored (a skip, not an error).
    pub async fn should_ingest(&self, unique_key: &str) -> StoreResult<bool> {
        Ok(self.store.find_item(unique_key).await?.is_none())
    }
}
