// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Engine error types.
//!
//! Variants keep their parameters through wrapping so the RPC layer can
//! discriminate not-found, invalid-argument and internal kinds.

use displaydoc::Display;
use fluxdb_db_exports::StoreError;
use fluxdb_models::error::ModelsError;
use fluxdb_tablets::TabletError;
use thiserror::Error;

/// State error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum StateError {
    /// store error: {0}
    StoreError(#[from] StoreError),
    /// tablet error: {0}
    TabletError(#[from] TabletError),
    /// models error: {0}
    ModelsError(#[from] ModelsError),
    /// database is empty: no irreversible block has been written yet
    EmptyDatabase,
    /// requested block {requested} is higher than head block {head} (last irreversible block {lib})
    BlockNumHigherThanHead { requested: u32, head: u32, lib: u32 },
    /// requested block {requested} is higher than last irreversible block {lib}
    BlockNumHigherThanLib { requested: u32, lib: u32 },
    /// speculative overlay does not chain: {0}
    BrokenChain(String),
    /// corrupted stored data at key {key:?}: {reason}
    DataCorruption { key: String, reason: String },
    /// write pipeline must resync from the block source: {0}
    ResyncRequired(String),
}
