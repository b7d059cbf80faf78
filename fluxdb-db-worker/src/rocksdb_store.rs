// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! RocksDB implementation of the store abstraction.

use std::sync::Arc;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::debug;

use fluxdb_db_exports::{
    FamilyBatch, Key, StoreBatch, StoreConfig, StoreController, StoreError, Value, CF_ERROR,
    INDEXES_CF, METADATA_CF, OPEN_ERROR, ROWS_CF,
};

/// RocksDB-backed store with one column family per key family.
///
/// Rows and index snapshots must not share a keyspace: forward row scans
/// would otherwise collide with the reverse-encoded index keys of the same
/// tablet.
#[derive(Debug)]
pub struct RocksdbStore {
    db: Arc<DB>,
}

impl RocksdbStore {
    /// Open or create the database described by `config`.
    pub fn new(config: StoreConfig) -> Self {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(
            &db_opts,
            &config.path,
            vec![
                ColumnFamilyDescriptor::new(ROWS_CF, Options::default()),
                ColumnFamilyDescriptor::new(INDEXES_CF, Options::default()),
                ColumnFamilyDescriptor::new(METADATA_CF, Options::default()),
            ],
        )
        .expect(OPEN_ERROR);

        RocksdbStore { db: Arc::new(db) }
    }

    fn handle(&self, family: &str) -> &ColumnFamily {
        self.db.cf_handle(family).expect(CF_ERROR)
    }

    fn apply_family(&self, batch: &mut WriteBatch, family: &str, changes: &FamilyBatch) {
        let handle = self.handle(family);
        for (key, value) in changes {
            match value {
                Some(value) => batch.put_cf(handle, key, value),
                None => batch.delete_cf(handle, key),
            }
        }
    }
}

impl StoreController for RocksdbStore {
    fn get(&self, family: &str, key: &[u8]) -> Result<Option<Value>, StoreError> {
        self.db
            .get_cf(self.handle(family), key)
            .map_err(|e| StoreError::RocksDbError(format!("{:?}", e)))
    }

    fn multi_get(&self, family: &str, keys: Vec<Key>) -> Result<Vec<Option<Value>>, StoreError> {
        let handle = self.handle(family);
        let query: Vec<_> = keys.iter().map(|key| (handle, key)).collect();

        self.db
            .multi_get_cf(query)
            .into_iter()
            .map(|res| res.map_err(|e| StoreError::RocksDbError(format!("{:?}", e))))
            .collect()
    }

    fn scan(
        &self,
        family: &str,
        start: &[u8],
        end: &[u8],
    ) -> Box<dyn Iterator<Item = (Key, Value)> + '_> {
        let end = end.to_vec();
        Box::new(
            self.db
                .iterator_cf(
                    self.handle(family),
                    IteratorMode::From(start, Direction::Forward),
                )
                .flatten()
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .take_while(move |(k, _)| k.as_slice() < end.as_slice()),
        )
    }

    fn fetch_first_ge(
        &self,
        family: &str,
        prefix: &[u8],
        start: &[u8],
    ) -> Result<Option<(Key, Value)>, StoreError> {
        let mut iter = self.db.iterator_cf(
            self.handle(family),
            IteratorMode::From(start, Direction::Forward),
        );

        match iter.next() {
            None => Ok(None),
            Some(Err(e)) => Err(StoreError::RocksDbError(format!("{:?}", e))),
            Some(Ok((key, value))) => {
                if key.starts_with(prefix) {
                    Ok(Some((key.to_vec(), value.to_vec())))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn write_batch(&self, batch: StoreBatch) -> Result<(), StoreError> {
        let mut write_batch = WriteBatch::default();
        self.apply_family(&mut write_batch, ROWS_CF, &batch.rows);
        self.apply_family(&mut write_batch, INDEXES_CF, &batch.indexes);
        self.apply_family(&mut write_batch, METADATA_CF, &batch.metadata);

        debug!(
            approximate_bytes = batch.approximate_bytes(),
            "writing batch to disk"
        );

        self.db
            .write(write_batch)
            .map_err(|e| StoreError::RocksDbError(format!("can't write batch to disk: {}", e)))
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::RocksDbError(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RocksdbStore) {
        let dir = TempDir::new().unwrap();
        let store = RocksdbStore::new(StoreConfig {
            path: dir.path().to_path_buf(),
        });
        (dir, store)
    }

    #[test]
    #[serial]
    fn test_batch_is_atomic_across_families() {
        let (_dir, store) = setup();

        let mut batch = StoreBatch::new();
        batch.set_row(b"cst/a:b:c/00000001/pk".to_vec(), vec![1]);
        batch.set_index(b"cst/a:b:c/fffffffe".to_vec(), vec![2]);
        batch.set_meta(b"last_written_block".to_vec(), vec![3]);
        store.write_batch(batch).unwrap();

        assert_eq!(
            store.get(ROWS_CF, b"cst/a:b:c/00000001/pk").unwrap(),
            Some(vec![1])
        );
        assert_eq!(
            store.get(INDEXES_CF, b"cst/a:b:c/fffffffe").unwrap(),
            Some(vec![2])
        );
        assert_eq!(
            store.get(METADATA_CF, b"last_written_block").unwrap(),
            Some(vec![3])
        );
    }

    #[test]
    #[serial]
    fn test_scan_bounds_are_inclusive_exclusive() {
        let (_dir, store) = setup();

        let mut batch = StoreBatch::new();
        for block in ["00000001", "00000002", "00000003"] {
            batch.set_row(format!("t/{}/pk", block).into_bytes(), vec![0]);
        }
        store.write_batch(batch).unwrap();

        let keys: Vec<_> = store
            .scan(ROWS_CF, b"t/00000001", b"t/00000003")
            .map(|(k, _)| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["t/00000001/pk", "t/00000002/pk"]);
    }

    #[test]
    #[serial]
    fn test_fetch_first_ge_respects_prefix() {
        let (_dir, store) = setup();

        let mut batch = StoreBatch::new();
        batch.set_index(b"a/ffffff00".to_vec(), vec![1]);
        batch.set_index(b"b/ffffff50".to_vec(), vec![2]);
        store.write_batch(batch).unwrap();

        let hit = store
            .fetch_first_ge(INDEXES_CF, b"a/", b"a/fffffe00")
            .unwrap();
        assert_eq!(hit, Some((b"a/ffffff00".to_vec(), vec![1])));

        // The next entry at or after the start key belongs to another
        // tablet, so the lookup must miss.
        let miss = store
            .fetch_first_ge(INDEXES_CF, b"a/", b"a/ffffffff")
            .unwrap();
        assert_eq!(miss, None);
    }
}
