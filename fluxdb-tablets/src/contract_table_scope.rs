// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Contract table scope tablet: one tablet per `(contract, table)` pair,
//! one row per scope the table exists in.
//!
//! Row payload layout: `<payer: u64 BE name>`, empty on deletion.

use std::fmt;

use fluxdb_models::name::{name_to_u64, u64_to_name};

use crate::error::TabletError;
use crate::primary_key::{decode_name, encode_name};
use crate::tablet::{row_from_kv, Tablet, TabletRow};

const CTBLS_PREFIX: &str = "ctbls";
const PAYER_BYTES: usize = 8;

/// Tablet of the scopes of one contract table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTableScopeTablet(String);

impl ContractTableScopeTablet {
    pub fn new(contract: &str, table: &str) -> Self {
        ContractTableScopeTablet(format!("{}/{}:{}", CTBLS_PREFIX, contract, table))
    }

    pub(crate) fn from_key(tablet_key: &str) -> Result<Self, TabletError> {
        let parts = tablet_key
            .strip_prefix("ctbls/")
            .ok_or_else(|| TabletError::UnknownCollection(tablet_key.to_string()))?;
        if parts.split(':').count() != 2 {
            return Err(TabletError::InvalidKey(
                tablet_key.to_string(),
                "expected contract:table parts".to_string(),
            ));
        }
        Ok(ContractTableScopeTablet(tablet_key.to_string()))
    }

    /// Split the tablet key back into `(contract, table)`.
    pub fn explode(&self) -> (&str, &str) {
        let parts = &self.0[CTBLS_PREFIX.len() + 1..];
        let mut chunks = parts.split(':');
        (
            chunks.next().unwrap_or_default(),
            chunks.next().unwrap_or_default(),
        )
    }

    pub fn new_row(
        &self,
        block_num: u32,
        scope: &str,
        payer: &str,
        is_deletion: bool,
    ) -> Result<TabletRow, TabletError> {
        let payload = if is_deletion {
            Vec::new()
        } else {
            name_to_u64(payer)?.to_be_bytes().to_vec()
        };

        Ok(TabletRow::new(
            CTBLS_PREFIX,
            self.0.clone(),
            block_num,
            scope.to_string(),
            payload,
        ))
    }
}

impl fmt::Display for ContractTableScopeTablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Tablet for ContractTableScopeTablet {
    fn collection(&self) -> &'static str {
        CTBLS_PREFIX
    }

    fn key(&self) -> &str {
        &self.0
    }

    fn new_row_from_kv(&self, key: &str, value: &[u8]) -> Result<TabletRow, TabletError> {
        // An empty value is the scope deletion tombstone.
        if !value.is_empty() && value.len() != PAYER_BYTES {
            return Err(TabletError::InvalidPayload(
                key.to_string(),
                "table scope row value should be empty (deletion) or 8 payer bytes".to_string(),
            ));
        }
        row_from_kv(CTBLS_PREFIX, key, value)
    }

    fn primary_key_byte_count(&self) -> usize {
        8
    }

    fn encode_primary_key(&self, buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
        encode_name(buffer, primary_key)
    }

    fn decode_primary_key(&self, buffer: &[u8]) -> Result<String, TabletError> {
        decode_name(buffer)
    }
}

/// Typed view over a table scope [`TabletRow`].
pub struct ContractTableScopeRow<'a>(&'a TabletRow);

impl<'a> ContractTableScopeRow<'a> {
    pub fn new(row: &'a TabletRow) -> Result<Self, TabletError> {
        if row.collection() != CTBLS_PREFIX {
            return Err(TabletError::InvalidKey(
                row.key(),
                "not a table scope row".to_string(),
            ));
        }
        Ok(ContractTableScopeRow(row))
    }

    /// The scope this row declares.
    pub fn scope(&self) -> &str {
        self.0.primary_key()
    }

    pub fn payer(&self) -> String {
        let bytes: [u8; PAYER_BYTES] = self.0.payload()[..PAYER_BYTES]
            .try_into()
            .expect("payload validated at construction");
        u64_to_name(u64::from_be_bytes(bytes))
    }

    pub fn row(&self) -> &TabletRow {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_key_layout() {
        let tablet = ContractTableScopeTablet::new("eosio", "table");
        let row = tablet.new_row(0, "scope", "payer", false).unwrap();
        assert_eq!(row.key(), "ctbls/eosio:table/00000000/scope");
    }

    #[test]
    fn test_empty_payload_is_tombstone() {
        let tablet = ContractTableScopeTablet::new("eosio", "table");
        let key = tablet.key_for_row_at(5, "scope");

        let row = tablet.new_row_from_kv(&key, &[]).unwrap();
        assert!(row.is_deletion());

        // Anything that is neither empty nor a payer name is corrupt.
        assert!(tablet.new_row_from_kv(&key, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_scope_and_payer() {
        let tablet = ContractTableScopeTablet::new("eosio", "accounts");
        let row = tablet.new_row(3, "alice", "eosio", false).unwrap();
        let view = ContractTableScopeRow::new(&row).unwrap();
        assert_eq!(view.scope(), "alice");
        assert_eq!(view.payer(), "eosio");
    }
}
