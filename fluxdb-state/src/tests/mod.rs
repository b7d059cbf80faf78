// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! End-to-end engine scenarios over the in-memory backend.

use std::sync::Arc;

use fluxdb_db_exports::{StoreBatch, StoreController};
use fluxdb_db_worker::MemoryStore;
use fluxdb_models::block::{BlockId, BlockRef};
use fluxdb_tablets::{
    ContractAbiSiglet, ContractStateRow, ContractStateTablet, Tablet, WriteRequest,
};
use more_asserts::assert_le;

use crate::{BlockEvent, FluxDb, StateConfig, StateError, WritePipeline};

const PK: &str = "0000000000000001";

fn block_ref(num: u32) -> BlockRef {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&num.to_be_bytes());
    BlockRef::new(num, BlockId::from_bytes(bytes))
}

fn new_db() -> FluxDb {
    FluxDb::new(Arc::new(MemoryStore::new()), StateConfig::default()).unwrap()
}

fn request(num: u32) -> WriteRequest {
    WriteRequest::new(block_ref(num), block_ref(num - 1))
}

fn state_row(
    tablet: &ContractStateTablet,
    num: u32,
    primary_key: &str,
    payer: &str,
    data: &[u8],
    is_deletion: bool,
) -> fluxdb_tablets::TabletRow {
    tablet
        .new_row(num, primary_key, payer, data, is_deletion)
        .unwrap()
}

/// Writes an irreversible block carrying the given rows.
fn write_block(db: &FluxDb, num: u32, rows: Vec<fluxdb_tablets::TabletRow>) {
    let mut request = request(num);
    request.tablet_rows = rows;
    db.apply_irreversible_block(request).unwrap();
}

#[test]
fn test_write_then_tombstone_versions() {
    let db = new_db();
    let tablet = ContractStateTablet::new("eosio.token", "alice", "accounts");

    write_block(
        &db,
        100,
        vec![state_row(&tablet, 100, PK, "alice", &[0x01], false)],
    );
    write_block(&db, 150, vec![state_row(&tablet, 150, PK, "", &[], true)]);

    let rows = db.read_tablet_at(140, &tablet, &[]).unwrap();
    assert_eq!(rows.len(), 1);
    let view = ContractStateRow::new(&rows[0]).unwrap();
    assert_eq!(view.payer(), "alice");
    assert_eq!(view.data(), &[0x01]);
    assert_eq!(rows[0].block_num(), 100);

    // The tombstone hides the row from its block onward.
    assert!(db.read_tablet_at(160, &tablet, &[]).unwrap().is_empty());
    assert!(db.read_tablet_at(150, &tablet, &[]).unwrap().is_empty());
    assert!(db
        .read_tablet_row_at(160, &tablet, PK, &[])
        .unwrap()
        .is_none());
}

#[test]
fn test_speculative_overlay_is_only_visible_when_applied() {
    let db = new_db();
    let tablet = ContractStateTablet::new("eosio.token", "alice", "accounts");

    write_block(&db, 100, vec![]);
    for num in 101..=105 {
        let mut request = request(num);
        if num == 103 {
            request.tablet_rows = vec![state_row(
                &tablet,
                103,
                "0000000000000002",
                "bob",
                &[0x02],
                false,
            )];
        }
        db.apply_new_block(request).unwrap();
    }

    let prepared = db.prepare_read(105, false).unwrap();
    assert_eq!(prepared.speculative_writes.len(), 5);
    assert_eq!(prepared.up_to_block, Some(block_ref(105)));

    let with_overlay = db
        .read_tablet_at(105, &tablet, &prepared.speculative_writes)
        .unwrap();
    assert_eq!(with_overlay.len(), 1);
    assert_eq!(with_overlay[0].block_num(), 103);

    let without_overlay = db.read_tablet_at(105, &tablet, &[]).unwrap();
    assert!(without_overlay.is_empty());
}

#[test]
fn test_fork_switch_reads_only_the_new_fork() {
    let db = new_db();
    let tablet = ContractStateTablet::new("eosio", "s", "t");

    write_block(&db, 100, vec![]);

    // Original fork [101, 102, 103] writes pk at 102.
    let mut wr = request(101);
    db.apply_new_block(wr).unwrap();
    wr = request(102);
    wr.tablet_rows = vec![state_row(&tablet, 102, PK, "alice", &[0xAA], false)];
    db.apply_new_block(wr).unwrap();
    wr = request(103);
    db.apply_new_block(wr).unwrap();

    // Fork switch back to 101, replaced by [102', 103'] writing different
    // data.
    db.apply_undo_block(block_ref(103), block_ref(102)).unwrap();
    db.apply_undo_block(block_ref(102), block_ref(101)).unwrap();

    let mut wr = WriteRequest::new(
        BlockRef::new(102, BlockId::from_bytes([0xB2; 32])),
        block_ref(101),
    );
    wr.tablet_rows = vec![state_row(&tablet, 102, PK, "bob", &[0xBB], false)];
    db.apply_new_block(wr).unwrap();
    let wr = WriteRequest::new(
        BlockRef::new(103, BlockId::from_bytes([0xB3; 32])),
        BlockRef::new(102, BlockId::from_bytes([0xB2; 32])),
    );
    db.apply_new_block(wr).unwrap();

    let prepared = db.prepare_read(103, false).unwrap();
    let rows = db
        .read_tablet_at(103, &tablet, &prepared.speculative_writes)
        .unwrap();
    assert_eq!(rows.len(), 1);
    let view = ContractStateRow::new(&rows[0]).unwrap();
    assert_eq!(view.payer(), "bob");
    assert_eq!(view.data(), &[0xBB]);
}

#[test]
fn test_index_build_collapses_history() {
    let db = new_db();
    let tablet = ContractStateTablet::new("eosio", "s", "t");

    // Four row versions at blocks {1, 5, 5, 9}: pk1 written at 1, 5 and
    // 9, plus a tombstone for a second key at 5.
    write_block(&db, 1, vec![state_row(&tablet, 1, PK, "alice", &[1], false)]);
    write_block(
        &db,
        5,
        vec![
            state_row(&tablet, 5, PK, "alice", &[5], false),
            state_row(&tablet, 5, "0000000000000002", "", &[], true),
        ],
    );
    write_block(&db, 9, vec![state_row(&tablet, 9, PK, "alice", &[9], false)]);

    // Build the snapshot at block 7 and persist it.
    db.idx_cache.write().schedule_index(tablet.key(), 7);
    let mut batch = StoreBatch::new();
    db.index_tablets(&mut batch).unwrap();
    db.store.write_batch(batch).unwrap();

    let index = db.fetch_index(tablet.key(), 7).unwrap().unwrap();
    assert_eq!(index.at_block_num, 7);
    assert_eq!(index.squelched, 3);
    assert_eq!(index.map.len(), 1);
    assert_eq!(index.map.get(PK), Some(&5));

    // Reads through the snapshot return the block-5 payload.
    let rows = db.read_tablet_at(7, &tablet, &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].block_num(), 5);
    let view = ContractStateRow::new(&rows[0]).unwrap();
    assert_eq!(view.data(), &[5]);

    // Snapshot-replay equivalence: reading at 9 via the snapshot equals
    // reading with no snapshot at all.
    let through_snapshot = db.read_tablet_at(9, &tablet, &[]).unwrap();
    assert_eq!(through_snapshot.len(), 1);
    assert_eq!(through_snapshot[0].block_num(), 9);
}

#[test]
fn test_abi_siglet_versions() {
    let db = new_db();
    let siglet = ContractAbiSiglet::new("eosio");

    for abi_block in [3u32, 5] {
        let mut wr = request(abi_block);
        wr.siglet_entries = vec![siglet.new_entry(abi_block, format!("{}", abi_block).as_bytes())];
        db.apply_irreversible_block(wr).unwrap();
    }

    let cases = [(6u32, Some(5u32)), (4, Some(3)), (5, Some(5)), (3, Some(3)), (2, None)];
    for (fetch_at, expected) in cases {
        let entry = db.read_siglet_entry_at(fetch_at, &siglet, &[]).unwrap();
        match expected {
            None => assert!(entry.is_none(), "expected no ABI at block {}", fetch_at),
            Some(block) => {
                let entry = entry.unwrap_or_else(|| panic!("missing ABI at block {}", fetch_at));
                assert_eq!(entry.block_num(), block);
                assert_eq!(entry.payload(), format!("{}", block).as_bytes());
            }
        }
    }
}

#[test]
fn test_prepare_read_pins_and_rejects() {
    let db = new_db();
    assert!(matches!(
        db.prepare_read(0, false),
        Err(StateError::EmptyDatabase)
    ));

    write_block(&db, 100, vec![]);
    for num in 101..=105 {
        db.apply_new_block(request(num)).unwrap();
    }

    // 0 resolves to head, or to LIB under irreversible_only.
    assert_eq!(db.prepare_read(0, false).unwrap().chosen_block_num, 105);
    assert_eq!(db.prepare_read(0, true).unwrap().chosen_block_num, 100);

    assert!(matches!(
        db.prepare_read(106, false),
        Err(StateError::BlockNumHigherThanHead {
            requested: 106,
            head: 105,
            lib: 100,
        })
    ));
    assert!(matches!(
        db.prepare_read(105, true),
        Err(StateError::BlockNumHigherThanLib {
            requested: 105,
            lib: 100,
        })
    ));

    // Truncation: a read pinned below head only carries the overlay
    // prefix up to its block.
    let prepared = db.prepare_read(103, false).unwrap();
    assert_eq!(prepared.speculative_writes.len(), 3);
    for wr in &prepared.speculative_writes {
        assert_le!(wr.block_ref.num, 103);
    }
}

#[test]
fn test_overlay_equivalence_with_persisted_state() {
    // Reading head state through the overlay must equal reading the same
    // state after every overlay block became irreversible.
    let tablet = ContractStateTablet::new("eosio", "s", "t");

    let build_requests = || {
        vec![
            {
                let mut wr = request(101);
                wr.tablet_rows = vec![state_row(&tablet, 101, PK, "alice", &[1], false)];
                wr
            },
            {
                let mut wr = request(102);
                wr.tablet_rows = vec![
                    state_row(&tablet, 102, "0000000000000002", "bob", &[2], false),
                    state_row(&tablet, 102, PK, "", &[], true),
                ];
                wr
            },
        ]
    };

    let speculative_db = new_db();
    write_block(&speculative_db, 100, vec![]);
    for wr in build_requests() {
        speculative_db.apply_new_block(wr).unwrap();
    }
    let prepared = speculative_db.prepare_read(102, false).unwrap();
    let speculative_rows = speculative_db
        .read_tablet_at(102, &tablet, &prepared.speculative_writes)
        .unwrap();

    let persisted_db = new_db();
    write_block(&persisted_db, 100, vec![]);
    for wr in build_requests() {
        persisted_db.apply_irreversible_block(wr).unwrap();
    }
    let persisted_rows = persisted_db.read_tablet_at(102, &tablet, &[]).unwrap();

    assert_eq!(speculative_rows, persisted_rows);
    assert_eq!(speculative_rows.len(), 1);
    assert_eq!(speculative_rows[0].primary_key(), "0000000000000002");
}

#[test]
fn test_seen_markers_track_first_write() {
    let db = new_db();
    let tablet = ContractStateTablet::new("eosio", "s", "t");

    write_block(&db, 100, vec![]);
    assert!(!db.has_seen_tablet_once(tablet.key()).unwrap());

    write_block(
        &db,
        101,
        vec![state_row(&tablet, 101, PK, "alice", &[1], false)],
    );
    assert!(db.has_seen_tablet_once(tablet.key()).unwrap());
}

#[tokio::test]
async fn test_write_pipeline_consumes_events_in_order() {
    let db = Arc::new(new_db());
    let tablet = ContractStateTablet::new("eosio", "s", "t");

    let (events_tx, events_rx) = tokio::sync::mpsc::channel(8);
    let pipeline = WritePipeline::new(db.clone(), events_rx);
    let handle = tokio::spawn(pipeline.run());

    let mut irreversible = request(100);
    irreversible.tablet_rows = vec![state_row(&tablet, 100, PK, "alice", &[1], false)];
    events_tx
        .send(BlockEvent::IrreversibleBlock(irreversible))
        .await
        .unwrap();

    let mut speculative = request(101);
    speculative.tablet_rows = vec![state_row(&tablet, 101, PK, "alice", &[2], false)];
    events_tx
        .send(BlockEvent::NewBlock(speculative))
        .await
        .unwrap();

    // Closing the stream stops the pipeline cleanly.
    drop(events_tx);
    handle.await.unwrap().unwrap();

    assert_eq!(db.last_written_block().unwrap().num, 100);
    assert_eq!(db.head_block().unwrap().num, 101);

    let prepared = db.prepare_read(0, false).unwrap();
    let rows = db
        .read_tablet_at(
            prepared.chosen_block_num,
            &tablet,
            &prepared.speculative_writes,
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].block_num(), 101);
}

#[tokio::test]
async fn test_write_pipeline_asks_for_resync_on_broken_chain() {
    let db = Arc::new(new_db());

    let (events_tx, events_rx) = tokio::sync::mpsc::channel(8);
    let pipeline = WritePipeline::new(db.clone(), events_rx);
    let handle = tokio::spawn(pipeline.run());

    events_tx
        .send(BlockEvent::IrreversibleBlock(request(100)))
        .await
        .unwrap();
    events_tx
        .send(BlockEvent::NewBlock(request(101)))
        .await
        .unwrap();

    // Block 103 does not link to the tip (101).
    events_tx
        .send(BlockEvent::NewBlock(request(103)))
        .await
        .unwrap();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(StateError::ResyncRequired(_))));

    // The overlay was invalidated; persisted state is untouched.
    assert!(db.speculative.read().is_empty());
    assert_eq!(db.last_written_block().unwrap().num, 100);
}

#[test]
fn test_monotone_reads_across_blocks() {
    let db = new_db();
    let tablet = ContractStateTablet::new("eosio", "s", "t");

    write_block(&db, 10, vec![state_row(&tablet, 10, PK, "alice", &[10], false)]);
    write_block(&db, 20, vec![state_row(&tablet, 20, PK, "alice", &[20], false)]);

    let mut last_version = 0;
    for target in 10..=25 {
        let rows = db.read_tablet_at(target, &tablet, &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_le!(last_version, rows[0].block_num());
        last_version = rows[0].block_num();
    }
    assert_eq!(last_version, 20);
}
