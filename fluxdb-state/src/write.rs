// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Write pipeline: consumes the ordered block event stream and owns every
//! mutation of the backend and the speculative overlay.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use fluxdb_db_exports::{StoreBatch, StoreController, LAST_WRITTEN_BLOCK_KEY};
use fluxdb_models::block::BlockRef;
use fluxdb_serialization::Serializer;
use fluxdb_tablets::WriteRequest;

use crate::error::StateError;
use crate::flux_db::{seen_key, FluxDb};

/// Ordered block events delivered by the block source.
///
/// The stream is causal: undos arrive before the replacing fork's blocks,
/// and irreversibility never regresses.
#[derive(Debug)]
pub enum BlockEvent {
    /// A new reversible block on the current fork.
    NewBlock(WriteRequest),
    /// The tip was undone; the overlay must roll back to `prev_block_ref`.
    UndoBlock {
        block_ref: BlockRef,
        prev_block_ref: BlockRef,
    },
    /// A block became irreversible and must be persisted.
    IrreversibleBlock(WriteRequest),
}

impl FluxDb {
    /// Append a reversible block to the speculative overlay.
    pub fn apply_new_block(&self, request: WriteRequest) -> Result<(), StateError> {
        request.validate()?;
        debug!(block = %request.block_ref, "applying new speculative block");

        self.speculative
            .write()
            .append(Arc::new(request), self.last_written_block())
    }

    /// Roll the overlay back to `prev_block_ref` after a fork switch.
    pub fn apply_undo_block(
        &self,
        block_ref: BlockRef,
        prev_block_ref: BlockRef,
    ) -> Result<(), StateError> {
        info!(undone_block = %block_ref, ancestor = %prev_block_ref, "undoing speculative block");

        self.speculative
            .write()
            .undo_to(&prev_block_ref, self.last_written_block())
    }

    /// Persist an irreversible block: one atomic batch carrying its rows,
    /// siglet entries, seen-once markers, the last-written-block metadata,
    /// and any index snapshot whose build was due.
    pub fn apply_irreversible_block(&self, request: WriteRequest) -> Result<(), StateError> {
        request.validate()?;
        debug!(
            block = %request.block_ref,
            row_count = request.tablet_rows.len(),
            siglet_entry_count = request.siglet_entries.len(),
            "writing irreversible block"
        );

        let mut batch = StoreBatch::new();

        // Snapshots scheduled by previous blocks are built first so their
        // row scans only ever see persisted history.
        self.index_tablets(&mut batch)?;

        let mut touched_tablets: BTreeSet<&str> = BTreeSet::new();
        for row in &request.tablet_rows {
            batch.set_row(row.key().into_bytes(), row.payload().to_vec());
            touched_tablets.insert(row.tablet_key());
        }
        for tablet_key in &touched_tablets {
            batch.set_meta(seen_key(tablet_key).into_bytes(), vec![1u8]);
        }
        for entry in &request.siglet_entries {
            batch.set_row(entry.key().into_bytes(), entry.payload().to_vec());
        }

        let mut last_written = Vec::new();
        self.block_ref_serializer
            .serialize(&request.block_ref, &mut last_written)
            .map_err(fluxdb_models::error::ModelsError::from)?;
        batch.set_meta(LAST_WRITTEN_BLOCK_KEY.to_vec(), last_written);

        self.store.write_batch(batch)?;

        self.set_last_written_block(request.block_ref);
        self.speculative
            .write()
            .promote_to_lib(request.block_ref.num);

        let mut cache = self.idx_cache.write();
        for row in &request.tablet_rows {
            cache.increment_count(row.tablet_key());
        }
        for tablet_key in touched_tablets {
            if cache.should_trigger_indexing(tablet_key, &self.config) {
                debug!(%tablet_key, block_num = request.block_ref.num, "scheduling tablet indexing");
                cache.schedule_index(tablet_key, request.block_ref.num);
            }
        }

        Ok(())
    }

    /// Drop the whole overlay, used when a reversible failure invalidates
    /// it. Persisted state is untouched.
    pub fn truncate_speculative(&self) {
        self.speculative.write().clear();
    }
}

/// Single consumer of the block event stream.
///
/// Backend failures on an irreversible block are fatal: the pipeline halts
/// and surfaces the error for the operator to reconcile. Failures on
/// reversible blocks invalidate the overlay and ask the supervisor for a
/// resync from the block source.
pub struct WritePipeline {
    db: Arc<FluxDb>,
    events: mpsc::Receiver<BlockEvent>,
}

impl WritePipeline {
    pub fn new(db: Arc<FluxDb>, events: mpsc::Receiver<BlockEvent>) -> Self {
        WritePipeline { db, events }
    }

    /// Consume events until the source closes the channel.
    pub async fn run(mut self) -> Result<(), StateError> {
        while let Some(event) = self.events.recv().await {
            match event {
                BlockEvent::NewBlock(request) => {
                    if let Err(e) = self.db.apply_new_block(request) {
                        warn!(error = %e, "reversible block rejected, overlay invalidated");
                        self.db.truncate_speculative();
                        return Err(StateError::ResyncRequired(e.to_string()));
                    }
                }
                BlockEvent::UndoBlock {
                    block_ref,
                    prev_block_ref,
                } => {
                    if let Err(e) = self.db.apply_undo_block(block_ref, prev_block_ref) {
                        warn!(error = %e, "undo rejected, overlay invalidated");
                        self.db.truncate_speculative();
                        return Err(StateError::ResyncRequired(e.to_string()));
                    }
                }
                BlockEvent::IrreversibleBlock(request) => {
                    let block_ref = request.block_ref;
                    if let Err(e) = self.db.apply_irreversible_block(request) {
                        error!(block = %block_ref, error = %e, "fatal: irreversible block write failed");
                        return Err(e);
                    }
                }
            }
        }

        info!("block event stream closed, write pipeline stopping");
        Ok(())
    }
}
