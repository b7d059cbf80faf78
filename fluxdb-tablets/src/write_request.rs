// Copyright (c) 2023 MASSA LABS <info@massa.net>

use fluxdb_models::block::BlockRef;

use crate::error::TabletError;
use crate::tablet::{SigletEntry, TabletRow};

/// Atomic per-block batch of writes produced by the block source.
///
/// Invariant: every row and entry carries the request's block number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Block these writes belong to.
    pub block_ref: BlockRef,
    /// Parent of that block; chains consecutive requests together.
    pub prev_block_ref: BlockRef,
    /// Tablet row versions written by the block.
    pub tablet_rows: Vec<TabletRow>,
    /// Siglet entry versions written by the block.
    pub siglet_entries: Vec<SigletEntry>,
}

impl WriteRequest {
    pub fn new(block_ref: BlockRef, prev_block_ref: BlockRef) -> Self {
        WriteRequest {
            block_ref,
            prev_block_ref,
            tablet_rows: Vec::new(),
            siglet_entries: Vec::new(),
        }
    }

    /// Check the shared-block-number invariant.
    pub fn validate(&self) -> Result<(), TabletError> {
        for row in &self.tablet_rows {
            if row.block_num() != self.block_ref.num {
                return Err(TabletError::InvalidKey(
                    row.key(),
                    format!(
                        "row block number {} differs from request block {}",
                        row.block_num(),
                        self.block_ref.num
                    ),
                ));
            }
        }
        for entry in &self.siglet_entries {
            if entry.block_num() != self.block_ref.num {
                return Err(TabletError::InvalidKey(
                    entry.key(),
                    format!(
                        "siglet entry block number {} differs from request block {}",
                        entry.block_num(),
                        self.block_ref.num
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContractStateTablet;
    use fluxdb_models::block::{BlockId, BlockRef};

    fn block_ref(num: u32) -> BlockRef {
        BlockRef::new(num, BlockId::from_bytes([num as u8; 32]))
    }

    #[test]
    fn test_validate_rejects_mismatched_block_numbers() {
        let tablet = ContractStateTablet::new("eosio", "s", "t");
        let mut request = WriteRequest::new(block_ref(5), block_ref(4));

        request.tablet_rows.push(
            tablet
                .new_row(5, "0000000000000001", "alice", &[1], false)
                .unwrap(),
        );
        assert!(request.validate().is_ok());

        request.tablet_rows.push(
            tablet
                .new_row(6, "0000000000000002", "alice", &[1], false)
                .unwrap(),
        );
        assert!(request.validate().is_err());
    }
}
