// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Lazy ABI handling.
//!
//! ABI payloads are opaque to the store: a JSON descriptor listing the
//! contract's tables and their types. The [`AbiRowRenderer`] carries
//! everything needed to render a row to JSON at response-serialization
//! time, so raw reads never pay any decode cost.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::GrpcError;

#[derive(Debug, Deserialize)]
struct AbiJson {
    #[serde(default)]
    tables: Vec<AbiTableJson>,
}

#[derive(Debug, Deserialize)]
struct AbiTableJson {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

/// Parsed ABI of one contract at one block.
#[derive(Debug)]
pub(crate) struct AbiDefinition {
    raw: Vec<u8>,
    block_num: u32,
    tables: HashMap<String, String>,
}

impl AbiDefinition {
    pub(crate) fn parse(contract: &str, block_num: u32, raw: &[u8]) -> Result<Self, GrpcError> {
        let parsed: AbiJson = serde_json::from_slice(raw).map_err(|e| {
            GrpcError::InternalServerError(format!(
                "stored ABI of {} at block {} is not decodable: {}",
                contract, block_num, e
            ))
        })?;

        Ok(AbiDefinition {
            raw: raw.to_vec(),
            block_num,
            tables: parsed
                .tables
                .into_iter()
                .map(|t| (t.name, t.type_name))
                .collect(),
        })
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub(crate) fn block_num(&self) -> u32 {
        self.block_num
    }

    /// Type of `table`, or `None` when the ABI does not declare it.
    pub(crate) fn table_type(&self, table: &str) -> Option<&str> {
        self.tables.get(table).map(String::as_str)
    }
}

/// Deferred JSON rendering of one row.
pub(crate) struct AbiRowRenderer {
    abi: Arc<AbiDefinition>,
    table_type: String,
    raw_row: Vec<u8>,
}

impl AbiRowRenderer {
    pub(crate) fn new(abi: Arc<AbiDefinition>, table_type: &str, raw_row: &[u8]) -> Self {
        AbiRowRenderer {
            abi,
            table_type: table_type.to_string(),
            raw_row: raw_row.to_vec(),
        }
    }

    /// Decode the row bytes, failing as a decode error when the stored
    /// payload does not match the ABI.
    pub(crate) fn to_json(&self) -> Result<String, GrpcError> {
        let value: serde_json::Value = serde_json::from_slice(&self.raw_row).map_err(|e| {
            GrpcError::InternalServerError(format!(
                "row does not decode as {} (ABI at block {}): {}",
                self.table_type,
                self.abi.block_num(),
                e
            ))
        })?;

        serde_json::to_string(&value)
            .map_err(|e| GrpcError::InternalServerError(format!("re-encoding row: {}", e)))
    }
}

#[cfg(test)]
mod abi_tests {
    use super::*;

    const ABI: &[u8] = br#"{"version":"flux::abi/1.0","tables":[{"name":"accounts","type":"account"}]}"#;

    #[test]
    fn test_table_type_lookup() {
        let abi = AbiDefinition::parse("eosio.token", 3, ABI).unwrap();
        assert_eq!(abi.table_type("accounts"), Some("account"));
        assert_eq!(abi.table_type("stat"), None);
        assert_eq!(abi.block_num(), 3);
        assert_eq!(abi.raw(), ABI);
    }

    #[test]
    fn test_row_rendering_is_deferred() {
        let abi = Arc::new(AbiDefinition::parse("eosio.token", 3, ABI).unwrap());

        let renderer = AbiRowRenderer::new(abi.clone(), "account", br#"{"balance":"1.0 EOS"}"#);
        assert_eq!(renderer.to_json().unwrap(), r#"{"balance":"1.0 EOS"}"#);

        // Malformed rows only fail when actually rendered.
        let renderer = AbiRowRenderer::new(abi, "account", &[0xFF]);
        assert!(renderer.to_json().is_err());
    }

    #[test]
    fn test_malformed_abi_rejected() {
        assert!(AbiDefinition::parse("eosio", 1, &[0x00]).is_err());
    }
}
