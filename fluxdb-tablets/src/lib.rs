// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Schema layer of FluxDB.
//!
//! Every entity kind stored by the platform is either a *tablet* (many
//! primary keys, each versioned over blocks) or a *siglet* (one value
//! versioned over blocks). This crate defines the key codec shared by all
//! of them, the [`Tablet`] / [`Siglet`] traits, the registered kinds, the
//! per-block [`WriteRequest`], and the materialized [`TableIndex`]
//! snapshot format.

mod auth_link;
mod contract_abi;
mod contract_state;
mod contract_table_scope;
mod error;
mod index;
mod key;
mod key_account;
mod primary_key;
mod resource_limits;
mod tablet;
mod write_request;

pub use auth_link::{AuthLinkRow, AuthLinkTablet};
pub use contract_abi::{ContractAbiEntry, ContractAbiSiglet};
pub use contract_state::{ContractStateRow, ContractStateTablet};
pub use contract_table_scope::{ContractTableScopeRow, ContractTableScopeTablet};
pub use error::TabletError;
pub use index::{TableIndex, TableIndexDeserializer, TableIndexSerializer};
pub use key::{
    block_num_from_hex, block_num_from_rev_hex, explode_index_key, explode_row_key,
    explode_siglet_row_key, hex_block_num, hex_rev_block_num, ExplodedRowKey,
};
pub use key_account::{KeyAccountRow, KeyAccountTablet};
pub use resource_limits::{AccountResourceLimitTablet, BlockResourceLimitTablet};
pub use tablet::{siglet_for_key, tablet_for_key, Siglet, SigletEntry, Tablet, TabletRow};
pub use write_request::WriteRequest;
