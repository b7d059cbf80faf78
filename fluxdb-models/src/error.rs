// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Error types for the base value types.

use displaydoc::Display;
use thiserror::Error;

/// Models error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ModelsError {
    /// invalid block id: {0}
    InvalidBlockId(String),
    /// invalid account name: {0}
    InvalidName(String),
    /// serialization error: {0}
    SerializeError(#[from] fluxdb_serialization::SerializeError),
}
