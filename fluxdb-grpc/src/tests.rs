// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Handler-level tests over the in-memory backend.

use std::sync::Arc;

use futures::StreamExt;
use tonic::{Code, Request};

use fluxdb_db_worker::MemoryStore;
use fluxdb_models::block::{BlockId, BlockRef};
use fluxdb_state::{FluxDb, StateConfig};
use fluxdb_tablets::{ContractAbiSiglet, ContractStateTablet, WriteRequest};

use crate::config::GrpcConfig;
use crate::pb;
use crate::pb::state_server::State;
use crate::public::StateService;

const PK: &str = "0000000000000001";
const ABI: &[u8] = br#"{"version":"flux::abi/1.0","tables":[{"name":"accounts","type":"account"}]}"#;

fn block_ref(num: u32) -> BlockRef {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&num.to_be_bytes());
    BlockRef::new(num, BlockId::from_bytes(bytes))
}

fn service() -> StateService {
    let db = FluxDb::new(Arc::new(MemoryStore::new()), StateConfig::default()).unwrap();
    StateService {
        db: Arc::new(db),
        config: GrpcConfig::default(),
    }
}

fn write_contract_row(db: &FluxDb, num: u32, contract: &str, data: &[u8]) {
    let tablet = ContractStateTablet::new(contract, "shared", "accounts");
    let mut request = WriteRequest::new(block_ref(num), block_ref(num - 1));
    request.tablet_rows = vec![tablet.new_row(num, PK, "alice", data, false).unwrap()];
    db.apply_irreversible_block(request).unwrap();
}

fn write_abi(db: &FluxDb, num: u32, contract: &str) {
    let siglet = ContractAbiSiglet::new(contract);
    let mut request = WriteRequest::new(block_ref(num), block_ref(num - 1));
    request.siglet_entries = vec![siglet.new_entry(num, ABI)];
    db.apply_irreversible_block(request).unwrap();
}

#[tokio::test]
async fn test_read_table_renders_rows_and_metadata() {
    let service = service();
    write_abi(&service.db, 1, "eosio.token");
    write_contract_row(&service.db, 2, "eosio.token", br#"{"balance":"1.0 EOS"}"#);

    let response = service
        .read_table(Request::new(pb::ReadTableRequest {
            contract: "eosio.token".to_string(),
            scope: "shared".to_string(),
            table: "accounts".to_string(),
            block_num: 0,
            irreversible_only: false,
            to_json: true,
            with_block_num: true,
            with_abi: true,
            key_type: "uint64".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(
        response.last_irreversible_block_id,
        block_ref(2).id.to_string()
    );
    assert!(response.up_to_block_id.is_empty());
    assert_eq!(response.abi, ABI);

    assert_eq!(response.rows.len(), 1);
    let row = &response.rows[0];
    assert_eq!(row.key, "1");
    assert_eq!(row.payer, "alice");
    assert_eq!(row.block_num, 2);
    assert!(row.data.is_empty());
    assert_eq!(row.json, r#"{"balance":"1.0 EOS"}"#);
}

#[tokio::test]
async fn test_read_table_row_not_found() {
    let service = service();
    write_contract_row(&service.db, 2, "eosio.token", &[1]);

    let status = service
        .read_table_row(Request::new(pb::ReadTableRowRequest {
            contract: "eosio.token".to_string(),
            scope: "shared".to_string(),
            table: "accounts".to_string(),
            primary_key: "99".to_string(),
            block_num: 0,
            irreversible_only: false,
            to_json: false,
            with_block_num: false,
            with_abi: false,
            key_type: "uint64".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn test_block_above_lib_is_invalid_argument() {
    let service = service();
    write_contract_row(&service.db, 2, "eosio.token", &[1]);

    let status = service
        .read_table(Request::new(pb::ReadTableRequest {
            contract: "eosio.token".to_string(),
            scope: "shared".to_string(),
            table: "accounts".to_string(),
            block_num: 50,
            irreversible_only: true,
            to_json: false,
            with_block_num: false,
            with_abi: false,
            key_type: String::new(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = service
        .read_table(Request::new(pb::ReadTableRequest {
            contract: "NOT A NAME".to_string(),
            scope: String::new(),
            table: "accounts".to_string(),
            block_num: 0,
            irreversible_only: false,
            to_json: false,
            with_block_num: false,
            with_abi: false,
            key_type: String::new(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_multi_contract_fan_out_streams_in_sorted_order() {
    let service = service();
    write_contract_row(&service.db, 2, "b", &[0xB0]);
    write_contract_row(&service.db, 3, "a", &[0xA0]);
    write_contract_row(&service.db, 4, "c", &[0xC0]);

    let response = service
        .get_multi_contracts_table_rows(Request::new(pb::GetMultiContractsTableRowsRequest {
            contracts: vec!["b".to_string(), "a".to_string(), "c".to_string()],
            scope: "shared".to_string(),
            table: "accounts".to_string(),
            block_num: 0,
            irreversible_only: false,
            to_json: false,
            with_block_num: false,
            key_type: String::new(),
        }))
        .await
        .unwrap();

    let mut stream = response.into_inner();
    let mut contracts = Vec::new();
    while let Some(next) = stream.next().await {
        let next = next.unwrap();
        assert_eq!(next.rows.len(), 1);
        contracts.push(next.contract);
    }

    assert_eq!(contracts, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_get_table_scopes_distinguishes_empty_from_unknown() {
    let service = service();
    write_contract_row(&service.db, 2, "eosio.token", &[1]);

    let status = service
        .get_table_scopes(Request::new(pb::GetTableScopesRequest {
            contract: "eosio.token".to_string(),
            table: "accounts".to_string(),
            block_num: 0,
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn test_get_abi_versions() {
    let service = service();
    write_abi(&service.db, 3, "eosio.token");

    let response = service
        .get_abi(Request::new(pb::GetAbiRequest {
            contract: "eosio.token".to_string(),
            block_num: 0,
            to_json: false,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.abi_block_num, 3);
    assert_eq!(response.raw_abi, ABI);

    let status = service
        .get_abi(Request::new(pb::GetAbiRequest {
            contract: "eosio".to_string(),
            block_num: 0,
            to_json: false,
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}
