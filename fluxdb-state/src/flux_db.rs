// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! The engine struct and the read-preparation helper shared by every
//! query entry point.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use fluxdb_db_exports::{StoreController, LAST_WRITTEN_BLOCK_KEY, METADATA_CF, SEEN_PREFIX};
use fluxdb_models::block::{BlockRef, BlockRefDeserializer, BlockRefSerializer};
use fluxdb_serialization::{DeserializeError, Deserializer};
use fluxdb_tablets::WriteRequest;

use crate::config::StateConfig;
use crate::error::StateError;
use crate::indexing::IndexCache;
use crate::speculative::SpeculativeLog;

/// Versioned historical state engine.
///
/// The write pipeline is the single mutator; read entry points only take
/// shared locks, and never across backend I/O (the overlay is snapshotted
/// before any store access).
pub struct FluxDb {
    pub(crate) store: Arc<dyn StoreController>,
    pub(crate) config: StateConfig,
    pub(crate) speculative: RwLock<SpeculativeLog>,
    pub(crate) idx_cache: RwLock<IndexCache>,
    last_written_block: RwLock<Option<BlockRef>>,
    pub(crate) block_ref_serializer: BlockRefSerializer,
}

impl std::fmt::Debug for FluxDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluxDb")
            .field("store", &self.store)
            .field("last_written_block", &*self.last_written_block.read())
            .finish()
    }
}

/// Everything a query handler needs to run a consistent read.
#[derive(Debug, Clone)]
pub struct PreparedRead {
    /// Block the read is pinned to (0 requests resolve here).
    pub chosen_block_num: u32,
    /// Last irreversible block written to the backend.
    pub last_written_block: BlockRef,
    /// Newest overlay block applied to the read, when any.
    pub up_to_block: Option<BlockRef>,
    /// Overlay chain to apply on top of persisted state.
    pub speculative_writes: Vec<Arc<WriteRequest>>,
}

impl FluxDb {
    /// Attach the engine to a backend, recovering the last written block.
    pub fn new(store: Arc<dyn StoreController>, config: StateConfig) -> Result<Self, StateError> {
        let last_written_block = match store.get(METADATA_CF, LAST_WRITTEN_BLOCK_KEY)? {
            None => None,
            Some(raw) => {
                let (_, block_ref) = BlockRefDeserializer::new()
                    .deserialize::<DeserializeError>(&raw)
                    .map_err(|e| StateError::DataCorruption {
                        key: String::from_utf8_lossy(LAST_WRITTEN_BLOCK_KEY).into_owned(),
                        reason: e.to_string(),
                    })?;
                Some(block_ref)
            }
        };

        debug!(?last_written_block, "opened flux state");

        Ok(FluxDb {
            store,
            config,
            speculative: RwLock::new(SpeculativeLog::new()),
            idx_cache: RwLock::new(IndexCache::default()),
            last_written_block: RwLock::new(last_written_block),
            block_ref_serializer: BlockRefSerializer::new(),
        })
    }

    /// Last irreversible block written to the backend.
    pub fn last_written_block(&self) -> Option<BlockRef> {
        *self.last_written_block.read()
    }

    pub(crate) fn set_last_written_block(&self, block_ref: BlockRef) {
        *self.last_written_block.write() = Some(block_ref);
    }

    /// Tip of the currently selected fork: the newest overlay block, or
    /// the last written block when the overlay is empty.
    pub fn head_block(&self) -> Option<BlockRef> {
        self.speculative.read().tip().or(self.last_written_block())
    }

    /// Resolve a requested block number into a concrete read plan.
    ///
    /// `block_num == 0` means "head" (or LIB when `irreversible_only`).
    pub fn prepare_read(
        &self,
        block_num: u32,
        irreversible_only: bool,
    ) -> Result<PreparedRead, StateError> {
        let last_written_block = self.last_written_block().ok_or(StateError::EmptyDatabase)?;
        let lib_num = last_written_block.num;

        if irreversible_only {
            if block_num > lib_num {
                return Err(StateError::BlockNumHigherThanLib {
                    requested: block_num,
                    lib: lib_num,
                });
            }
            let chosen_block_num = if block_num == 0 { lib_num } else { block_num };
            return Ok(PreparedRead {
                chosen_block_num,
                last_written_block,
                up_to_block: None,
                speculative_writes: Vec::new(),
            });
        }

        let head_block = self.head_block().ok_or(StateError::EmptyDatabase)?;
        let chosen_block_num = if block_num == 0 {
            head_block.num
        } else {
            block_num
        };
        if chosen_block_num > head_block.num {
            return Err(StateError::BlockNumHigherThanHead {
                requested: chosen_block_num,
                head: head_block.num,
                lib: lib_num,
            });
        }

        let speculative_writes = self
            .speculative
            .read()
            .fetch(&head_block.id, chosen_block_num);
        let up_to_block = speculative_writes.last().map(|wr| wr.block_ref);

        if !speculative_writes.is_empty() {
            debug!(
                speculative_write_count = speculative_writes.len(),
                up_to_block = %up_to_block.as_ref().map(ToString::to_string).unwrap_or_default(),
                "speculative writes present"
            );
        }

        Ok(PreparedRead {
            chosen_block_num,
            last_written_block,
            up_to_block,
            speculative_writes,
        })
    }

    /// Whether rows of `tablet_key` were ever written, at any block.
    pub fn has_seen_tablet_once(&self, tablet_key: &str) -> Result<bool, StateError> {
        Ok(self
            .store
            .get(METADATA_CF, seen_key(tablet_key).as_bytes())?
            .is_some())
    }
}

pub(crate) fn seen_key(tablet_key: &str) -> String {
    format!("{}{}", SEEN_PREFIX, tablet_key)
}
