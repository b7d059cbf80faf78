// Copyright (c) 2023 MASSA LABS <info@massa.net>

use displaydoc::Display;
use fluxdb_models::error::ModelsError;
use fluxdb_state::StateError;

/// Errors of the gRPC component.
#[non_exhaustive]
#[derive(Display, thiserror::Error, Debug)]
pub enum GrpcError {
    /// state error: {0}
    StateError(#[from] StateError),
    /// models error: {0}
    ModelsError(#[from] ModelsError),
    /// tablet error: {0}
    TabletError(#[from] fluxdb_tablets::TabletError),
    /// invalid argument: {0}
    InvalidArgument(String),
    /// ABI for contract {contract} not found at block {block_num}
    AbiNotFound { contract: String, block_num: u32 },
    /// table {contract}/{table} not found at block {block_num}
    TableNotFound {
        contract: String,
        table: String,
        block_num: u32,
    },
    /// row {primary_key} not found in {contract}/{scope}/{table} at block {block_num}
    RowNotFound {
        contract: String,
        scope: String,
        table: String,
        primary_key: String,
        block_num: u32,
    },
    /// no account linked to public key {public_key} at block {block_num}
    PublicKeyNotFound {
        public_key: String,
        block_num: u32,
    },
    /// Internal server error: {0}
    InternalServerError(String),
}

impl From<GrpcError> for tonic::Status {
    fn from(error: GrpcError) -> Self {
        match error {
            GrpcError::StateError(e) => match e {
                StateError::BlockNumHigherThanHead { .. }
                | StateError::BlockNumHigherThanLib { .. } => {
                    tonic::Status::invalid_argument(e.to_string())
                }
                _ => tonic::Status::internal(e.to_string()),
            },
            GrpcError::ModelsError(e) => tonic::Status::invalid_argument(e.to_string()),
            GrpcError::TabletError(e) => tonic::Status::internal(e.to_string()),
            GrpcError::InvalidArgument(e) => tonic::Status::invalid_argument(e),
            GrpcError::AbiNotFound { .. }
            | GrpcError::TableNotFound { .. }
            | GrpcError::RowNotFound { .. }
            | GrpcError::PublicKeyNotFound { .. } => tonic::Status::not_found(error.to_string()),
            GrpcError::InternalServerError(e) => tonic::Status::internal(e),
        }
    }
}
