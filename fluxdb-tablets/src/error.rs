// Copyright (c) 2023 MASSA LABS <info@massa.net>

use displaydoc::Display;
use fluxdb_models::error::ModelsError;
use thiserror::Error;

/// Tablet error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum TabletError {
    /// invalid key {0:?}: {1}
    InvalidKey(String, String),
    /// invalid payload for {0}: {1}
    InvalidPayload(String, String),
    /// invalid primary key {0:?}: {1}
    InvalidPrimaryKey(String, String),
    /// unknown collection prefix in key {0:?}
    UnknownCollection(String),
    /// invalid table index for {0}: {1}
    InvalidIndex(String, String),
    /// models error: {0}
    ModelsError(#[from] ModelsError),
}
