// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Resource limit tablets.
//!
//! `arl/<account>` versions one account's resource limit object;
//! `brl` (no parts) versions the chain-global block resource limits.
//! Both key their single conceptual row with a one-byte discriminant and
//! store the limit object as opaque bytes.

use std::fmt;

use crate::error::TabletError;
use crate::primary_key::{decode_one_byte, encode_one_byte};
use crate::tablet::{row_from_kv, Tablet, TabletRow};

const ARL_PREFIX: &str = "arl";
const BRL_PREFIX: &str = "brl";

/// Tablet of one account's resource limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountResourceLimitTablet(String);

impl AccountResourceLimitTablet {
    pub fn new(account: &str) -> Self {
        AccountResourceLimitTablet(format!("{}/{}", ARL_PREFIX, account))
    }

    pub(crate) fn from_key(tablet_key: &str) -> Result<Self, TabletError> {
        let account = tablet_key
            .strip_prefix("arl/")
            .ok_or_else(|| TabletError::UnknownCollection(tablet_key.to_string()))?;
        if account.is_empty() {
            return Err(TabletError::InvalidKey(
                tablet_key.to_string(),
                "expected an account part".to_string(),
            ));
        }
        Ok(AccountResourceLimitTablet(tablet_key.to_string()))
    }

    pub fn account(&self) -> &str {
        &self.0[ARL_PREFIX.len() + 1..]
    }

    pub fn new_row(
        &self,
        block_num: u32,
        primary_key: &str,
        data: &[u8],
        is_deletion: bool,
    ) -> TabletRow {
        let payload = if is_deletion { Vec::new() } else { data.to_vec() };
        TabletRow::new(
            ARL_PREFIX,
            self.0.clone(),
            block_num,
            primary_key.to_string(),
            payload,
        )
    }
}

impl fmt::Display for AccountResourceLimitTablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Tablet for AccountResourceLimitTablet {
    fn collection(&self) -> &'static str {
        ARL_PREFIX
    }

    fn key(&self) -> &str {
        &self.0
    }

    fn new_row_from_kv(&self, key: &str, value: &[u8]) -> Result<TabletRow, TabletError> {
        row_from_kv(ARL_PREFIX, key, value)
    }

    fn primary_key_byte_count(&self) -> usize {
        1
    }

    fn encode_primary_key(&self, buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
        encode_one_byte(buffer, primary_key)
    }

    fn decode_primary_key(&self, buffer: &[u8]) -> Result<String, TabletError> {
        decode_one_byte(buffer)
    }
}

/// Chain-global block resource limits tablet. Its key has no parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResourceLimitTablet;

impl BlockResourceLimitTablet {
    pub fn new() -> Self {
        BlockResourceLimitTablet
    }

    pub(crate) fn from_key(tablet_key: &str) -> Result<Self, TabletError> {
        if tablet_key != BRL_PREFIX {
            return Err(TabletError::InvalidKey(
                tablet_key.to_string(),
                "block resource limit tablet key has no parts".to_string(),
            ));
        }
        Ok(BlockResourceLimitTablet)
    }

    pub fn new_row(
        &self,
        block_num: u32,
        primary_key: &str,
        data: &[u8],
        is_deletion: bool,
    ) -> TabletRow {
        let payload = if is_deletion { Vec::new() } else { data.to_vec() };
        TabletRow::new(
            BRL_PREFIX,
            BRL_PREFIX.to_string(),
            block_num,
            primary_key.to_string(),
            payload,
        )
    }
}

impl Default for BlockResourceLimitTablet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockResourceLimitTablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BRL_PREFIX)
    }
}

impl Tablet for BlockResourceLimitTablet {
    fn collection(&self) -> &'static str {
        BRL_PREFIX
    }

    fn key(&self) -> &str {
        BRL_PREFIX
    }

    fn new_row_from_kv(&self, key: &str, value: &[u8]) -> Result<TabletRow, TabletError> {
        row_from_kv(BRL_PREFIX, key, value)
    }

    fn primary_key_byte_count(&self) -> usize {
        1
    }

    fn encode_primary_key(&self, buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
        encode_one_byte(buffer, primary_key)
    }

    fn decode_primary_key(&self, buffer: &[u8]) -> Result<String, TabletError> {
        decode_one_byte(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_limit_row_key() {
        let tablet = AccountResourceLimitTablet::new("eosio");
        let row = tablet.new_row(12, "01", &[9, 9], false);
        assert_eq!(row.key(), "arl/eosio/0000000c/01");
        assert_eq!(row.payload(), &[9, 9]);
    }

    #[test]
    fn test_block_limit_row_key_has_no_parts() {
        let tablet = BlockResourceLimitTablet::new();
        let row = tablet.new_row(1, "01", &[7], false);
        assert_eq!(row.key(), "brl/00000001/01");
        assert!(BlockResourceLimitTablet::from_key("brl").is_ok());
        assert!(BlockResourceLimitTablet::from_key("brl/x").is_err());
    }
}
