// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Contract state tablet: one tablet per `(contract, scope, table)` triple,
//! one row per table primary key.
//!
//! Row payload layout: `<payer: u64 BE name><table row bytes>`, empty on
//! deletion.

use std::fmt;

use fluxdb_models::name::{name_to_u64, u64_to_name};

use crate::error::TabletError;
use crate::primary_key::{decode_hex_u64, encode_hex_u64};
use crate::tablet::{row_from_kv, Tablet, TabletRow};

const CST_PREFIX: &str = "cst";
const PAYER_BYTES: usize = 8;

/// Tablet of the rows of one contract table in one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractStateTablet(String);

impl ContractStateTablet {
    pub fn new(contract: &str, scope: &str, table: &str) -> Self {
        ContractStateTablet(format!("{}/{}:{}:{}", CST_PREFIX, contract, scope, table))
    }

    pub(crate) fn from_key(tablet_key: &str) -> Result<Self, TabletError> {
        let parts = tablet_key
            .strip_prefix("cst/")
            .ok_or_else(|| TabletError::UnknownCollection(tablet_key.to_string()))?;
        if parts.split(':').count() != 3 {
            return Err(TabletError::InvalidKey(
                tablet_key.to_string(),
                "expected contract:scope:table parts".to_string(),
            ));
        }
        Ok(ContractStateTablet(tablet_key.to_string()))
    }

    /// Split the tablet key back into `(contract, scope, table)`.
    pub fn explode(&self) -> (&str, &str, &str) {
        let parts = &self.0[CST_PREFIX.len() + 1..];
        let mut chunks = parts.split(':');
        (
            chunks.next().unwrap_or_default(),
            chunks.next().unwrap_or_default(),
            chunks.next().unwrap_or_default(),
        )
    }

    /// Build a row version. `primary_key` is the canonical 16-hex form of
    /// the table's `u64` primary key.
    pub fn new_row(
        &self,
        block_num: u32,
        primary_key: &str,
        payer: &str,
        data: &[u8],
        is_deletion: bool,
    ) -> Result<TabletRow, TabletError> {
        let payload = if is_deletion {
            Vec::new()
        } else {
            let mut payload = Vec::with_capacity(PAYER_BYTES + data.len());
            payload.extend_from_slice(&name_to_u64(payer)?.to_be_bytes());
            payload.extend_from_slice(data);
            payload
        };

        Ok(TabletRow::new(
            CST_PREFIX,
            self.0.clone(),
            block_num,
            primary_key.to_string(),
            payload,
        ))
    }
}

impl fmt::Display for ContractStateTablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Tablet for ContractStateTablet {
    fn collection(&self) -> &'static str {
        CST_PREFIX
    }

    fn key(&self) -> &str {
        &self.0
    }

    fn new_row_from_kv(&self, key: &str, value: &[u8]) -> Result<TabletRow, TabletError> {
        if !value.is_empty() && value.len() < PAYER_BYTES {
            return Err(TabletError::InvalidPayload(
                key.to_string(),
                "contract state row value should be empty (deletion) or carry at least 8 payer bytes"
                    .to_string(),
            ));
        }
        row_from_kv(CST_PREFIX, key, value)
    }

    fn primary_key_byte_count(&self) -> usize {
        8
    }

    fn encode_primary_key(&self, buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
        encode_hex_u64(buffer, primary_key)
    }

    fn decode_primary_key(&self, buffer: &[u8]) -> Result<String, TabletError> {
        decode_hex_u64(buffer)
    }
}

/// Typed view over a contract state [`TabletRow`].
pub struct ContractStateRow<'a>(&'a TabletRow);

impl<'a> ContractStateRow<'a> {
    pub fn new(row: &'a TabletRow) -> Result<Self, TabletError> {
        if row.collection() != CST_PREFIX {
            return Err(TabletError::InvalidKey(
                row.key(),
                "not a contract state row".to_string(),
            ));
        }
        Ok(ContractStateRow(row))
    }

    /// Name of the account paying for the row's storage.
    pub fn payer(&self) -> String {
        let bytes: [u8; PAYER_BYTES] = self.0.payload()[..PAYER_BYTES]
            .try_into()
            .expect("payload validated at construction");
        u64_to_name(u64::from_be_bytes(bytes))
    }

    /// Raw table row bytes, payer stripped.
    pub fn data(&self) -> &[u8] {
        &self.0.payload()[PAYER_BYTES..]
    }

    pub fn row(&self) -> &TabletRow {
        self.0
    }
}
