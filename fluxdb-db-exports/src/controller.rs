// Copyright (c) 2023 MASSA LABS <info@massa.net>

use std::fmt::Debug;

use crate::{Key, StoreBatch, StoreError, Value};

/// Ordered key-value backend used by the FluxDB engine.
///
/// Implementations must provide lexicographic ordering inside each key
/// family and atomicity of [`write_batch`](StoreController::write_batch)
/// across all three families. The engine is the single writer; readers may
/// call every non-mutating method concurrently.
pub trait StoreController: Send + Sync + Debug {
    /// Point lookup of `key` in the given family.
    fn get(&self, family: &str, key: &[u8]) -> Result<Option<Value>, StoreError>;

    /// Batched point lookups, one result slot per requested key.
    fn multi_get(&self, family: &str, keys: Vec<Key>) -> Result<Vec<Option<Value>>, StoreError>;

    /// Iterate entries with `start <= key < end` in lexicographic order.
    fn scan(
        &self,
        family: &str,
        start: &[u8],
        end: &[u8],
    ) -> Box<dyn Iterator<Item = (Key, Value)> + '_>;

    /// First entry with `key >= start` that still carries `prefix`, or
    /// `None`. This is the lookup behind "greatest index snapshot at or
    /// before block N" thanks to the reverse block-number key encoding.
    fn fetch_first_ge(
        &self,
        family: &str,
        prefix: &[u8],
        start: &[u8],
    ) -> Result<Option<(Key, Value)>, StoreError>;

    /// Atomically apply the whole batch.
    fn write_batch(&self, batch: StoreBatch) -> Result<(), StoreError>;

    /// Flush the backend's own buffers to durable storage.
    fn flush(&self) -> Result<(), StoreError>;
}
