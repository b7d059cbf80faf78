// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! The FluxDB engine.
//!
//! [`FluxDb`] ties the ordered KV backend, the schema layer and the
//! speculative overlay together: the write pipeline feeds it ordered block
//! events and persists one atomic batch per irreversible block, the index
//! manager materializes per-tablet snapshots so reads never replay from
//! genesis, and the read engine answers "tablet T at block N" by merging
//! snapshot, forward replay and speculative overlay.

mod config;
mod error;
mod flux_db;
mod indexing;
mod read;
mod speculative;
#[cfg(test)]
mod tests;
mod write;

pub use config::StateConfig;
pub use error::StateError;
pub use flux_db::{FluxDb, PreparedRead};
pub use speculative::SpeculativeLog;
pub use write::{BlockEvent, WritePipeline};
