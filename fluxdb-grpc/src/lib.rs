// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! gRPC query front-end of FluxDB.
//!
//! A thin tonic surface over the engine: request validation, the shared
//! read-preparation step, bounded multi-contract fan-out and lazy ABI
//! rendering. All state access goes through [`fluxdb_state::FluxDb`].

mod abi;
mod config;
mod error;
mod key_converter;
mod public;
mod server;
#[cfg(test)]
mod tests;

/// Generated protobuf/tonic bindings.
pub mod pb {
    tonic::include_proto!("fluxdb.v1");
}

pub use config::GrpcConfig;
pub use error::GrpcError;
pub use server::{FluxGrpc, StopHandle};
