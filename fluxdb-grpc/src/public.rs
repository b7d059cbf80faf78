// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Handlers of the public query service.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::debug;

use fluxdb_models::name::is_valid_name;
use fluxdb_state::{FluxDb, PreparedRead};
use fluxdb_tablets::{
    ContractAbiSiglet, ContractStateRow, ContractStateTablet, ContractTableScopeRow,
    ContractTableScopeTablet, KeyAccountRow, KeyAccountTablet, Tablet,
};

use crate::abi::{AbiDefinition, AbiRowRenderer};
use crate::config::GrpcConfig;
use crate::error::GrpcError;
use crate::key_converter::KeyConverter;
use crate::pb;

/// Public query service, shared with the tonic server task.
pub(crate) struct StateService {
    pub db: Arc<FluxDb>,
    pub config: GrpcConfig,
}

/// Common rendering options of the row-returning entry points.
#[derive(Debug, Clone)]
struct ReadTableParams {
    scope: String,
    table: String,
    to_json: bool,
    with_block_num: bool,
    key_converter: KeyConverter,
}

fn require_name(field: &str, value: &str) -> Result<(), GrpcError> {
    if !is_valid_name(value) || value.is_empty() {
        return Err(GrpcError::InvalidArgument(format!(
            "{} {:?} is not a valid name",
            field, value
        )));
    }
    Ok(())
}

fn require_scope(value: &str) -> Result<(), GrpcError> {
    // The empty scope is legal and common (global tables).
    if !value.is_empty() && !is_valid_name(value) {
        return Err(GrpcError::InvalidArgument(format!(
            "scope {:?} is not a valid name",
            value
        )));
    }
    Ok(())
}

fn up_to_block_id(prepared: &PreparedRead) -> String {
    prepared
        .up_to_block
        .map(|block_ref| block_ref.id.to_string())
        .unwrap_or_default()
}

/// Load and parse the contract's ABI as of the prepared block.
fn fetch_abi(
    db: &FluxDb,
    contract: &str,
    prepared: &PreparedRead,
) -> Result<Option<Arc<AbiDefinition>>, GrpcError> {
    let siglet = ContractAbiSiglet::new(contract);
    let entry = db.read_siglet_entry_at(
        prepared.chosen_block_num,
        &siglet,
        &prepared.speculative_writes,
    )?;

    match entry {
        None => Ok(None),
        Some(entry) => Ok(Some(Arc::new(AbiDefinition::parse(
            contract,
            entry.block_num(),
            entry.payload(),
        )?))),
    }
}

/// Read one contract-state tablet and render its rows, returning the ABI
/// when JSON rendering was requested.
fn read_contract_state_rows(
    db: &FluxDb,
    contract: &str,
    params: &ReadTableParams,
    prepared: &PreparedRead,
    with_abi: bool,
) -> Result<(Option<Arc<AbiDefinition>>, Vec<pb::TableRowResponse>), GrpcError> {
    let tablet = ContractStateTablet::new(contract, &params.scope, &params.table);
    let rows = db.read_tablet_at(
        prepared.chosen_block_num,
        &tablet,
        &prepared.speculative_writes,
    )?;

    debug!(tablet = %tablet, row_count = rows.len(), "read tablet rows results");

    let abi = if params.to_json || with_abi {
        let abi = fetch_abi(db, contract, prepared)?.ok_or_else(|| GrpcError::AbiNotFound {
            contract: contract.to_string(),
            block_num: prepared.chosen_block_num,
        })?;
        Some(abi)
    } else {
        None
    };

    let table_type = if params.to_json {
        let abi = abi.as_ref().expect("abi fetched when to_json is set");
        Some(
            abi.table_type(&params.table)
                .ok_or_else(|| GrpcError::TableNotFound {
                    contract: contract.to_string(),
                    table: params.table.clone(),
                    block_num: prepared.chosen_block_num,
                })?
                .to_string(),
        )
    } else {
        None
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let view = ContractStateRow::new(row)?;

        let (data, json) = match &table_type {
            Some(table_type) => {
                let renderer = AbiRowRenderer::new(
                    abi.as_ref().expect("abi fetched when to_json is set").clone(),
                    table_type,
                    view.data(),
                );
                (Vec::new(), renderer.to_json()?)
            }
            None => (view.data().to_vec(), String::new()),
        };

        out.push(pb::TableRowResponse {
            key: params.key_converter.to_client(row.primary_key())?,
            payer: view.payer(),
            data,
            json,
            block_num: if params.with_block_num {
                row.block_num()
            } else {
                0
            },
        });
    }

    Ok((abi, out))
}

#[tonic::async_trait]
impl pb::state_server::State for StateService {
    async fn read_table(
        &self,
        request: Request<pb::ReadTableRequest>,
    ) -> Result<Response<pb::ReadTableResponse>, Status> {
        let request = request.into_inner();
        debug!(?request, "read table");

        require_name("contract", &request.contract)?;
        require_name("table", &request.table)?;
        require_scope(&request.scope)?;

        let params = ReadTableParams {
            scope: request.scope,
            table: request.table,
            to_json: request.to_json,
            with_block_num: request.with_block_num,
            key_converter: KeyConverter::from_type(&request.key_type)?,
        };

        let prepared = self
            .db
            .prepare_read(request.block_num, request.irreversible_only)
            .map_err(GrpcError::from)?;

        let (abi, rows) = read_contract_state_rows(
            &self.db,
            &request.contract,
            &params,
            &prepared,
            request.with_abi,
        )?;

        Ok(Response::new(pb::ReadTableResponse {
            up_to_block_id: up_to_block_id(&prepared),
            last_irreversible_block_id: prepared.last_written_block.id.to_string(),
            abi: match (request.with_abi, abi) {
                (true, Some(abi)) => abi.raw().to_vec(),
                _ => Vec::new(),
            },
            rows,
        }))
    }

    async fn read_table_row(
        &self,
        request: Request<pb::ReadTableRowRequest>,
    ) -> Result<Response<pb::ReadTableRowResponse>, Status> {
        let request = request.into_inner();
        debug!(?request, "read table row");

        require_name("contract", &request.contract)?;
        require_name("table", &request.table)?;
        require_scope(&request.scope)?;

        let key_converter = KeyConverter::from_type(&request.key_type)?;
        let primary_key = key_converter.to_canonical(&request.primary_key)?;

        let prepared = self
            .db
            .prepare_read(request.block_num, request.irreversible_only)
            .map_err(GrpcError::from)?;

        let tablet = ContractStateTablet::new(&request.contract, &request.scope, &request.table);
        let row = self
            .db
            .read_tablet_row_at(
                prepared.chosen_block_num,
                &tablet,
                &primary_key,
                &prepared.speculative_writes,
            )
            .map_err(GrpcError::from)?
            .ok_or_else(|| GrpcError::RowNotFound {
                contract: request.contract.clone(),
                scope: request.scope.clone(),
                table: request.table.clone(),
                primary_key: request.primary_key.clone(),
                block_num: prepared.chosen_block_num,
            })?;

        let abi = if request.to_json || request.with_abi {
            Some(
                fetch_abi(&self.db, &request.contract, &prepared)?.ok_or_else(|| {
                    GrpcError::AbiNotFound {
                        contract: request.contract.clone(),
                        block_num: prepared.chosen_block_num,
                    }
                })?,
            )
        } else {
            None
        };

        let view = ContractStateRow::new(&row).map_err(GrpcError::from)?;
        let (data, json) = match (&abi, request.to_json) {
            (Some(abi), true) => {
                let table_type =
                    abi.table_type(&request.table)
                        .ok_or_else(|| GrpcError::TableNotFound {
                            contract: request.contract.clone(),
                            table: request.table.clone(),
                            block_num: prepared.chosen_block_num,
                        })?;
                let renderer = AbiRowRenderer::new(abi.clone(), table_type, view.data());
                (Vec::new(), renderer.to_json()?)
            }
            _ => (view.data().to_vec(), String::new()),
        };

        Ok(Response::new(pb::ReadTableRowResponse {
            up_to_block_id: up_to_block_id(&prepared),
            last_irreversible_block_id: prepared.last_written_block.id.to_string(),
            abi: match (request.with_abi, &abi) {
                (true, Some(abi)) => abi.raw().to_vec(),
                _ => Vec::new(),
            },
            row: Some(pb::TableRowResponse {
                key: request.primary_key,
                payer: view.payer(),
                data,
                json,
                block_num: if request.with_block_num {
                    row.block_num()
                } else {
                    0
                },
            }),
        }))
    }

    type GetTableScopesStream = BoxStream<'static, Result<pb::TableScopeResponse, Status>>;

    async fn get_table_scopes(
        &self,
        request: Request<pb::GetTableScopesRequest>,
    ) -> Result<Response<Self::GetTableScopesStream>, Status> {
        let request = request.into_inner();
        debug!(?request, "get table scopes");

        require_name("contract", &request.contract)?;
        require_name("table", &request.table)?;

        let prepared = self
            .db
            .prepare_read(request.block_num, false)
            .map_err(GrpcError::from)?;

        let tablet = ContractTableScopeTablet::new(&request.contract, &request.table);
        let rows = self
            .db
            .read_tablet_at(
                prepared.chosen_block_num,
                &tablet,
                &prepared.speculative_writes,
            )
            .map_err(GrpcError::from)?;

        // Rows come back in primary key order, which for this tablet is
        // already ascending scope order.
        let scopes: Vec<String> = rows
            .iter()
            .map(|row| Ok(ContractTableScopeRow::new(row)?.scope().to_string()))
            .collect::<Result<_, GrpcError>>()?;

        if scopes.is_empty() {
            debug!("no scopes found for request, checking if we ever saw this table");
            let seen = self
                .db
                .has_seen_tablet_once(tablet.key())
                .map_err(GrpcError::from)?;
            if !seen {
                return Err(GrpcError::TableNotFound {
                    contract: request.contract,
                    table: request.table,
                    block_num: prepared.chosen_block_num,
                }
                .into());
            }
        }

        let block_num = prepared.chosen_block_num;
        let stream = futures::stream::iter(
            scopes
                .into_iter()
                .map(move |scope| Ok(pb::TableScopeResponse { block_num, scope })),
        )
        .boxed();

        Ok(Response::new(stream))
    }

    type GetMultiContractsTableRowsStream =
        BoxStream<'static, Result<pb::TableRowsContractResponse, Status>>;

    async fn get_multi_contracts_table_rows(
        &self,
        request: Request<pb::GetMultiContractsTableRowsRequest>,
    ) -> Result<Response<Self::GetMultiContractsTableRowsStream>, Status> {
        let request = request.into_inner();
        debug!(?request, "get multi contracts table rows");

        require_name("table", &request.table)?;
        require_scope(&request.scope)?;
        for contract in &request.contracts {
            require_name("contract", contract)?;
        }

        let params = Arc::new(ReadTableParams {
            scope: request.scope,
            table: request.table,
            to_json: request.to_json,
            with_block_num: request.with_block_num,
            key_converter: KeyConverter::from_type(&request.key_type)?,
        });

        let prepared = Arc::new(
            self.db
                .prepare_read(request.block_num, request.irreversible_only)
                .map_err(GrpcError::from)?,
        );

        // Constant response order across calls: contracts sorted before
        // fan-out, and `buffered` preserves input order regardless of
        // per-contract completion time.
        let mut contracts = request.contracts;
        contracts.sort();

        let db = self.db.clone();
        let stream = futures::stream::iter(contracts)
            .map(move |contract| {
                let db = db.clone();
                let params = params.clone();
                let prepared = prepared.clone();
                async move {
                    let (_, rows) =
                        read_contract_state_rows(&db, &contract, &params, &prepared, false)?;
                    Ok::<_, GrpcError>(pb::TableRowsContractResponse {
                        contract,
                        up_to_block_id: up_to_block_id(&prepared),
                        last_irreversible_block_id: prepared.last_written_block.id.to_string(),
                        rows,
                    })
                }
            })
            .buffered(self.config.max_parallel_fanout)
            .map(|result| result.map_err(Status::from))
            .boxed();

        Ok(Response::new(stream))
    }

    async fn get_key_accounts(
        &self,
        request: Request<pb::GetKeyAccountsRequest>,
    ) -> Result<Response<pb::GetKeyAccountsResponse>, Status> {
        let request = request.into_inner();
        debug!(?request, "get key accounts");

        if request.public_key.is_empty() {
            return Err(GrpcError::InvalidArgument("public key is required".to_string()).into());
        }

        let prepared = self
            .db
            .prepare_read(request.block_num, false)
            .map_err(GrpcError::from)?;

        let tablet = KeyAccountTablet::new(&request.public_key);
        let rows = self
            .db
            .read_tablet_at(
                prepared.chosen_block_num,
                &tablet,
                &prepared.speculative_writes,
            )
            .map_err(GrpcError::from)?;

        let account_names: BTreeSet<String> = rows
            .iter()
            .map(|row| Ok(KeyAccountRow::new(row)?.account().to_string()))
            .collect::<Result<_, GrpcError>>()?;

        if account_names.is_empty() {
            let seen = self
                .db
                .has_seen_tablet_once(tablet.key())
                .map_err(GrpcError::from)?;
            if !seen {
                return Err(GrpcError::PublicKeyNotFound {
                    public_key: request.public_key,
                    block_num: prepared.chosen_block_num,
                }
                .into());
            }
        }

        Ok(Response::new(pb::GetKeyAccountsResponse {
            block_num: prepared.chosen_block_num,
            up_to_block_id: up_to_block_id(&prepared),
            last_irreversible_block_id: prepared.last_written_block.id.to_string(),
            account_names: account_names.into_iter().collect(),
        }))
    }

    async fn get_abi(
        &self,
        request: Request<pb::GetAbiRequest>,
    ) -> Result<Response<pb::GetAbiResponse>, Status> {
        let request = request.into_inner();
        debug!(?request, "get abi");

        require_name("contract", &request.contract)?;

        let prepared = self
            .db
            .prepare_read(request.block_num, false)
            .map_err(GrpcError::from)?;

        let abi =
            fetch_abi(&self.db, &request.contract, &prepared)?.ok_or_else(|| {
                GrpcError::AbiNotFound {
                    contract: request.contract.clone(),
                    block_num: prepared.chosen_block_num,
                }
            })?;

        let (raw_abi, json_abi) = if request.to_json {
            let value: serde_json::Value = serde_json::from_slice(abi.raw()).map_err(|e| {
                GrpcError::InternalServerError(format!("stored ABI is not decodable: {}", e))
            })?;
            (
                Vec::new(),
                serde_json::to_string(&value).map_err(|e| {
                    GrpcError::InternalServerError(format!("re-encoding ABI: {}", e))
                })?,
            )
        } else {
            (abi.raw().to_vec(), String::new())
        };

        Ok(Response::new(pb::GetAbiResponse {
            abi_block_num: abi.block_num(),
            up_to_block_id: up_to_block_id(&prepared),
            last_irreversible_block_id: prepared.last_written_block.id.to_string(),
            raw_abi,
            json_abi,
        }))
    }
}
