// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Read engine: resolves `(tablet, block_num)` queries by merging the
//! latest snapshot at or before the target, a forward replay of the rows
//! written since, and the speculative overlay.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use fluxdb_db_exports::{StoreController, ROWS_CF};
use fluxdb_tablets::{
    explode_row_key, hex_block_num, Siglet, SigletEntry, Tablet, TabletRow, WriteRequest,
};

use crate::error::StateError;
use crate::flux_db::FluxDb;

impl FluxDb {
    /// Read every live row of `tablet` as of `block_num`, primary key
    /// order. `speculative_writes` comes from
    /// [`prepare_read`](FluxDb::prepare_read).
    pub fn read_tablet_at(
        &self,
        block_num: u32,
        tablet: &dyn Tablet,
        speculative_writes: &[Arc<WriteRequest>],
    ) -> Result<Vec<TabletRow>, StateError> {
        let (mut working_map, start_block) = self.snapshot_at(tablet, block_num)?;

        self.replay_rows(tablet, start_block, block_num, |primary_key, version| {
            match version {
                Some(version_block) => {
                    working_map.insert(primary_key.to_string(), version_block);
                }
                None => {
                    working_map.remove(primary_key);
                }
            }
        })?;

        let mut overlay_rows: HashMap<String, TabletRow> = HashMap::new();
        for request in speculative_writes {
            if request.block_ref.num > block_num {
                continue;
            }
            for row in &request.tablet_rows {
                if row.tablet_key() != tablet.key() {
                    continue;
                }
                if row.is_deletion() {
                    working_map.remove(row.primary_key());
                    overlay_rows.remove(row.primary_key());
                } else {
                    working_map.insert(row.primary_key().to_string(), row.block_num());
                    overlay_rows.insert(row.primary_key().to_string(), row.clone());
                }
            }
        }

        debug!(
            tablet = %tablet,
            block_num,
            row_count = working_map.len(),
            "resolved tablet row versions"
        );

        self.materialize_rows(tablet, working_map, overlay_rows)
    }

    /// Read one primary key of `tablet` as of `block_num`, or `None` when
    /// the row is deleted or never existed.
    pub fn read_tablet_row_at(
        &self,
        block_num: u32,
        tablet: &dyn Tablet,
        primary_key: &str,
        speculative_writes: &[Arc<WriteRequest>],
    ) -> Result<Option<TabletRow>, StateError> {
        let (snapshot_map, start_block) = self.snapshot_at(tablet, block_num)?;
        let mut latest: Option<u32> = snapshot_map.get(primary_key).copied();

        self.replay_rows(tablet, start_block, block_num, |row_primary_key, version| {
            if row_primary_key == primary_key {
                latest = version;
            }
        })?;

        let mut overlay_row: Option<TabletRow> = None;
        for request in speculative_writes {
            if request.block_ref.num > block_num {
                continue;
            }
            for row in &request.tablet_rows {
                if row.tablet_key() != tablet.key() || row.primary_key() != primary_key {
                    continue;
                }
                if row.is_deletion() {
                    latest = None;
                    overlay_row = None;
                } else {
                    latest = Some(row.block_num());
                    overlay_row = Some(row.clone());
                }
            }
        }

        let Some(version_block) = latest else {
            return Ok(None);
        };

        if let Some(row) = overlay_row {
            if row.block_num() == version_block {
                return Ok(Some(row));
            }
        }

        let key = tablet.key_for_row_at(version_block, primary_key);
        let value = self
            .store
            .get(ROWS_CF, key.as_bytes())?
            .ok_or_else(|| StateError::DataCorruption {
                key: key.clone(),
                reason: "row referenced by resolved version is missing".to_string(),
            })?;

        Ok(Some(tablet.new_row_from_kv(&key, &value)?))
    }

    /// Read the value of `siglet` as of `block_num`, or `None` when unset
    /// or deleted at that block.
    pub fn read_siglet_entry_at(
        &self,
        block_num: u32,
        siglet: &dyn Siglet,
        speculative_writes: &[Arc<WriteRequest>],
    ) -> Result<Option<SigletEntry>, StateError> {
        let prefix = format!("{}/", siglet.key());
        let start = siglet.key_at(block_num);

        let persisted = match self
            .store
            .fetch_first_ge(ROWS_CF, prefix.as_bytes(), start.as_bytes())?
        {
            None => None,
            Some((raw_key, value)) => {
                let key =
                    String::from_utf8(raw_key).map_err(|e| StateError::DataCorruption {
                        key: start.clone(),
                        reason: format!("non UTF-8 siglet key: {}", e),
                    })?;
                Some(siglet.new_entry_from_kv(&key, &value)?)
            }
        };

        // Overlay blocks are strictly above the persisted watermark, so
        // any matching overlay entry supersedes the persisted one.
        let mut resolved = persisted;
        for request in speculative_writes {
            if request.block_ref.num > block_num {
                continue;
            }
            for entry in &request.siglet_entries {
                if entry.siglet_key() == siglet.key() {
                    resolved = Some(entry.clone());
                }
            }
        }

        Ok(resolved.filter(|entry| !entry.is_deletion()))
    }

    /// Load the working map of the latest snapshot at or before
    /// `block_num`, returning it with the first block the caller must
    /// replay from.
    fn snapshot_at(
        &self,
        tablet: &dyn Tablet,
        block_num: u32,
    ) -> Result<(BTreeMap<String, u32>, u32), StateError> {
        let cached = self.idx_cache.read().index(tablet.key());
        let index = match cached {
            Some(index) if index.at_block_num <= block_num => Some((*index).clone()),
            _ => self.fetch_index(tablet.key(), block_num)?,
        };

        Ok(match index {
            Some(index) => {
                let start = index.at_block_num.saturating_add(1);
                (index.map, start)
            }
            None => (BTreeMap::new(), 0),
        })
    }

    /// Scan the persisted rows of `tablet` in `[start_block, up_to_block]`
    /// and feed each version to `apply` (`None` payload = tombstone).
    fn replay_rows(
        &self,
        tablet: &dyn Tablet,
        start_block: u32,
        up_to_block: u32,
        mut apply: impl FnMut(&str, Option<u32>),
    ) -> Result<(), StateError> {
        let first_row_key = format!("{}/{}", tablet.key(), hex_block_num(start_block));
        let last_row_key = format!("{}/{}", tablet.key(), hex_block_num(up_to_block + 1));

        for (raw_key, value) in
            self.store
                .scan(ROWS_CF, first_row_key.as_bytes(), last_row_key.as_bytes())
        {
            let key = String::from_utf8(raw_key).map_err(|e| StateError::DataCorruption {
                key: first_row_key.clone(),
                reason: format!("non UTF-8 row key: {}", e),
            })?;
            let exploded = explode_row_key(&key)?;

            if value.is_empty() {
                apply(exploded.primary_key, None);
            } else {
                apply(exploded.primary_key, Some(exploded.block_num));
            }
        }

        Ok(())
    }

    /// Point-read every resolved `(primary_key, block)` version, serving
    /// overlay-resolved rows from memory.
    fn materialize_rows(
        &self,
        tablet: &dyn Tablet,
        working_map: BTreeMap<String, u32>,
        overlay_rows: HashMap<String, TabletRow>,
    ) -> Result<Vec<TabletRow>, StateError> {
        let mut rows = Vec::with_capacity(working_map.len());
        let mut fetch_keys: Vec<Vec<u8>> = Vec::new();
        let mut fetch_slots: Vec<usize> = Vec::new();

        for (primary_key, version_block) in &working_map {
            match overlay_rows.get(primary_key) {
                Some(row) if row.block_num() == *version_block => rows.push(Some(row.clone())),
                _ => {
                    fetch_keys.push(
                        tablet
                            .key_for_row_at(*version_block, primary_key)
                            .into_bytes(),
                    );
                    fetch_slots.push(rows.len());
                    rows.push(None);
                }
            }
        }

        if !fetch_keys.is_empty() {
            let values = self.store.multi_get(ROWS_CF, fetch_keys.clone())?;
            for ((key, value), slot) in fetch_keys.into_iter().zip(values).zip(fetch_slots) {
                let key = String::from_utf8(key).map_err(|e| StateError::DataCorruption {
                    key: tablet.key().to_string(),
                    reason: format!("non UTF-8 row key: {}", e),
                })?;
                let value = value.ok_or_else(|| StateError::DataCorruption {
                    key: key.clone(),
                    reason: "row referenced by resolved version is missing".to_string(),
                })?;
                rows[slot] = Some(tablet.new_row_from_kv(&key, &value)?);
            }
        }

        Ok(rows.into_iter().flatten().collect())
    }
}
