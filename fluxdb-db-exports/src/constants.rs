// Copyright (c) 2023 MASSA LABS <info@massa.net>

/// Column family holding versioned tablet and siglet rows.
pub const ROWS_CF: &str = "rows";
/// Column family holding materialized table index snapshots.
pub const INDEXES_CF: &str = "indexes";
/// Column family holding singleton metadata entries.
pub const METADATA_CF: &str = "metadata";

/// Metadata key of the last written (irreversible) block reference.
pub const LAST_WRITTEN_BLOCK_KEY: &[u8] = b"last_written_block";
/// Metadata key prefix of the seen-once tablet markers.
pub const SEEN_PREFIX: &str = "seen/";

pub const OPEN_ERROR: &str = "critical: rocksdb open operation failed";
pub const CF_ERROR: &str = "critical: rocksdb column family operation failed";
