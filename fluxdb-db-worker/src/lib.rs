// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Backend implementations of the FluxDB store abstraction: the rocksdb
//! production backend and an ordered in-memory backend used by tests.

mod memory_store;
mod rocksdb_store;

pub use memory_store::MemoryStore;
pub use rocksdb_store::RocksdbStore;
