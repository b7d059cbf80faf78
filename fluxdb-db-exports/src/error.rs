// Copyright (c) 2023 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// Store error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum StoreError {
    /// RocksDB error: {0}
    RocksDbError(String),
    /// unknown key family: {0}
    UnknownFamily(String),
}
