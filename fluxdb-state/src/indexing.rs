// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Index manager: tracks per-tablet mutation counters, schedules snapshot
//! builds, and materializes them into the flushing batch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use fluxdb_db_exports::{StoreBatch, StoreController, INDEXES_CF, ROWS_CF};
use fluxdb_tablets::{
    explode_index_key, explode_row_key, hex_block_num, hex_rev_block_num, tablet_for_key,
    TableIndex,
};

use crate::config::StateConfig;
use crate::error::StateError;
use crate::flux_db::FluxDb;

/// Per-tablet indexing state, guarded by one lock inside [`FluxDb`].
#[derive(Debug, Default)]
pub(crate) struct IndexCache {
    last_indexes: HashMap<String, Arc<TableIndex>>,
    last_counters: HashMap<String, u64>,
    schedule: HashMap<String, u32>,
}

impl IndexCache {
    pub(crate) fn index(&self, tablet_key: &str) -> Option<Arc<TableIndex>> {
        self.last_indexes.get(tablet_key).cloned()
    }

    pub(crate) fn cache_index(&mut self, tablet_key: &str, index: Arc<TableIndex>) {
        self.last_indexes.insert(tablet_key.to_string(), index);
    }

    pub(crate) fn increment_count(&mut self, tablet_key: &str) {
        *self.last_counters.entry(tablet_key.to_string()).or_default() += 1;
    }

    pub(crate) fn reset_counter(&mut self, tablet_key: &str) {
        self.last_counters.insert(tablet_key.to_string(), 0);
    }

    pub(crate) fn schedule_index(&mut self, tablet_key: &str, block_num: u32) {
        self.schedule.insert(tablet_key.to_string(), block_num);
    }

    pub(crate) fn take_schedule(&mut self) -> HashMap<String, u32> {
        std::mem::take(&mut self.schedule)
    }

    /// The spacing heuristic between snapshots of one tablet.
    pub(crate) fn should_trigger_indexing(&self, tablet_key: &str, config: &StateConfig) -> bool {
        let mutated_rows = self.last_counters.get(tablet_key).copied().unwrap_or(0);
        if mutated_rows < config.index_mutation_threshold {
            return false;
        }

        let Some(last_index) = self.last_indexes.get(tablet_key) else {
            return true;
        };

        let map_size = last_index.map.len();
        if map_size > config.index_medium_map_size
            && mutated_rows < config.index_medium_map_threshold
        {
            return false;
        }
        if map_size > config.index_large_map_size && mutated_rows < config.index_large_map_threshold
        {
            return false;
        }

        true
    }
}

impl FluxDb {
    /// Build every scheduled snapshot into `batch`, co-flushed with the
    /// irreversible block being written. Scheduled blocks are always
    /// already persisted, so the row scans below never miss pending rows.
    pub(crate) fn index_tablets(&self, batch: &mut StoreBatch) -> Result<(), StateError> {
        let schedule = self.idx_cache.write().take_schedule();
        if schedule.is_empty() {
            return Ok(());
        }

        for (tablet_key, block_num) in schedule {
            debug!(%tablet_key, block_num, "indexing tablet");

            if batch.approximate_bytes() > self.config.max_batch_bytes {
                self.store.write_batch(std::mem::take(batch))?;
            }

            let cached = self.idx_cache.read().index(&tablet_key);
            let mut index = match cached {
                Some(index) => (*index).clone(),
                None => self
                    .fetch_index(&tablet_key, block_num)?
                    .unwrap_or_default(),
            };

            let tablet = tablet_for_key(&tablet_key)?;

            let first_row_key = format!(
                "{}/{}",
                tablet_key,
                hex_block_num(index.at_block_num.saturating_add(1))
            );
            let last_row_key = format!("{}/{}", tablet_key, hex_block_num(block_num + 1));

            let mut count: u32 = 0;
            for (raw_key, value) in
                self.store
                    .scan(ROWS_CF, first_row_key.as_bytes(), last_row_key.as_bytes())
            {
                let key = String::from_utf8(raw_key).map_err(|e| StateError::DataCorruption {
                    key: first_row_key.clone(),
                    reason: format!("non UTF-8 row key: {}", e),
                })?;
                let exploded = explode_row_key(&key)?;

                count += 1;
                if value.is_empty() {
                    index.map.remove(exploded.primary_key);
                } else {
                    index
                        .map
                        .insert(exploded.primary_key.to_string(), exploded.block_num);
                }
            }

            index.at_block_num = block_num;
            index.squelched = count;

            let snapshot = index.marshal_binary(tablet.as_ref())?;
            let index_key = format!("{}/{}", tablet_key, hex_rev_block_num(block_num));

            if snapshot.len() > self.config.index_heavy_bytes {
                warn!(
                    %index_key,
                    byte_count = snapshot.len(),
                    "table index pretty heavy"
                );
            }

            batch.set_index(index_key.into_bytes(), snapshot);

            let mut cache = self.idx_cache.write();
            cache.cache_index(&tablet_key, Arc::new(index));
            cache.reset_counter(&tablet_key);
        }

        Ok(())
    }

    /// Load the most recent persisted snapshot of `tablet_key` at or
    /// before `block_num`, if any.
    pub(crate) fn fetch_index(
        &self,
        tablet_key: &str,
        block_num: u32,
    ) -> Result<Option<TableIndex>, StateError> {
        let prefix = format!("{}/", tablet_key);
        let start = format!("{}{}", prefix, hex_rev_block_num(block_num));

        let Some((raw_key, raw_index)) =
            self.store
                .fetch_first_ge(INDEXES_CF, prefix.as_bytes(), start.as_bytes())?
        else {
            return Ok(None);
        };

        let key = String::from_utf8(raw_key).map_err(|e| StateError::DataCorruption {
            key: start.clone(),
            reason: format!("non UTF-8 index key: {}", e),
        })?;
        let (found_tablet_key, at_block_num) = explode_index_key(&key)?;

        let tablet = tablet_for_key(found_tablet_key)?;
        let index = TableIndex::from_binary(tablet.as_ref(), at_block_num, &raw_index)?;

        debug!(
            %tablet_key,
            at_block_num,
            row_count = index.map.len(),
            "fetched table index from storage"
        );

        Ok(Some(index))
    }
}
