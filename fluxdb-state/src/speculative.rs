// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Speculative overlay: the in-memory log of write requests whose blocks
//! are still reversible (strictly above the last irreversible block).
//!
//! The log never touches the backend. Entries are `Arc`ed so `fetch`
//! hands out a snapshot of the chain without holding the lock while the
//! caller reads.

use std::sync::Arc;

use fluxdb_models::block::{BlockId, BlockRef};
use fluxdb_tablets::WriteRequest;

use crate::error::StateError;

/// Ordered log of the reversible write requests on the current fork.
#[derive(Debug, Default)]
pub struct SpeculativeLog {
    entries: Vec<Arc<WriteRequest>>,
}

impl SpeculativeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block reference of the newest entry, if any.
    pub fn tip(&self) -> Option<BlockRef> {
        self.entries.last().map(|wr| wr.block_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a reversible block. Its parent must be the current tip
    /// (falling back to the last persisted block when the log is empty).
    pub fn append(
        &mut self,
        request: Arc<WriteRequest>,
        persisted_tip: Option<BlockRef>,
    ) -> Result<(), StateError> {
        if let Some(expected) = self.tip().or(persisted_tip) {
            if request.prev_block_ref.id != expected.id {
                return Err(StateError::BrokenChain(format!(
                    "block {} links to parent {} but current tip is {}",
                    request.block_ref, request.prev_block_ref, expected
                )));
            }
        }

        self.entries.push(request);
        Ok(())
    }

    /// Discard entries above `ancestor`, which becomes the new tip. Called
    /// on a fork switch before the new fork's blocks arrive.
    pub fn undo_to(
        &mut self,
        ancestor: &BlockRef,
        persisted_tip: Option<BlockRef>,
    ) -> Result<(), StateError> {
        while let Some(last) = self.entries.last() {
            if last.block_ref.id == ancestor.id {
                return Ok(());
            }
            self.entries.pop();
        }

        // The whole log was undone: valid only when the target is the last
        // persisted block.
        match persisted_tip {
            Some(tip) if tip.id == ancestor.id => Ok(()),
            _ => Err(StateError::BrokenChain(format!(
                "undo target {} is neither in the overlay nor the persisted tip",
                ancestor
            ))),
        }
    }

    /// Drop entries at or below `block_num`: their block is now persisted.
    pub fn promote_to_lib(&mut self, block_num: u32) {
        self.entries.retain(|wr| wr.block_ref.num > block_num);
    }

    /// Drop everything (reversible failure recovery).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the chain prefix ending at `head_id`, truncated to entries
    /// with `block_num <= up_to_block_num`.
    ///
    /// An unknown `head_id` yields an empty list: it means the overlay
    /// advanced (promotion or fork switch) since the caller sampled the
    /// head, and the persisted state already covers that head.
    pub fn fetch(&self, head_id: &BlockId, up_to_block_num: u32) -> Vec<Arc<WriteRequest>> {
        let Some(position) = self
            .entries
            .iter()
            .rposition(|wr| wr.block_ref.id == *head_id)
        else {
            return Vec::new();
        };

        self.entries[..=position]
            .iter()
            .filter(|wr| wr.block_ref.num <= up_to_block_num)
            .cloned()
            .collect()
    }
}
