// Copyright (c) 2023 MASSA LABS <info@massa.net>

use serde::Deserialize;
use std::path::PathBuf;

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the database directory.
    pub path: PathBuf,
}
