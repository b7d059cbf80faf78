// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Ordered in-memory implementation of the store abstraction.
//!
//! Semantically equivalent to the rocksdb backend: same families, same
//! ordering, same bounds. Unit and scenario tests run against it; it is
//! not meant for production volumes.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};

use parking_lot::RwLock;

use fluxdb_db_exports::{
    FamilyBatch, Key, StoreBatch, StoreController, StoreError, Value, INDEXES_CF, METADATA_CF,
    ROWS_CF,
};

type Family = BTreeMap<Key, Value>;

/// In-memory ordered store, one `BTreeMap` per key family.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Family>,
    indexes: RwLock<Family>,
    metadata: RwLock<Family>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn family(&self, family: &str) -> Result<&RwLock<Family>, StoreError> {
        match family {
            ROWS_CF => Ok(&self.rows),
            INDEXES_CF => Ok(&self.indexes),
            METADATA_CF => Ok(&self.metadata),
            _ => Err(StoreError::UnknownFamily(family.to_string())),
        }
    }

    fn apply_family(target: &RwLock<Family>, changes: FamilyBatch) {
        let mut guard = target.write();
        for (key, value) in changes {
            match value {
                Some(value) => {
                    guard.insert(key, value);
                }
                None => {
                    guard.remove(&key);
                }
            }
        }
    }
}

impl StoreController for MemoryStore {
    fn get(&self, family: &str, key: &[u8]) -> Result<Option<Value>, StoreError> {
        Ok(self.family(family)?.read().get(key).cloned())
    }

    fn multi_get(&self, family: &str, keys: Vec<Key>) -> Result<Vec<Option<Value>>, StoreError> {
        let guard = self.family(family)?.read();
        Ok(keys.iter().map(|key| guard.get(key).cloned()).collect())
    }

    fn scan(
        &self,
        family: &str,
        start: &[u8],
        end: &[u8],
    ) -> Box<dyn Iterator<Item = (Key, Value)> + '_> {
        let Ok(family) = self.family(family) else {
            return Box::new(std::iter::empty());
        };

        let entries: Vec<_> = family
            .read()
            .range::<[u8], _>((Included(start), Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(entries.into_iter())
    }

    fn fetch_first_ge(
        &self,
        family: &str,
        prefix: &[u8],
        start: &[u8],
    ) -> Result<Option<(Key, Value)>, StoreError> {
        let guard = self.family(family)?.read();
        Ok(guard
            .range::<[u8], _>((Included(start), std::ops::Bound::Unbounded))
            .next()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn write_batch(&self, batch: StoreBatch) -> Result<(), StoreError> {
        Self::apply_family(&self.rows, batch.rows);
        Self::apply_family(&self.indexes, batch.indexes);
        Self::apply_family(&self.metadata, batch.metadata);
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
