// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Key account tablet: one tablet per public key, one row per
//! `(account, permission)` pair the key participates in.
//!
//! Row payload is a single presence byte, empty on deletion.

use std::fmt;

use crate::error::TabletError;
use crate::primary_key::{decode_name_pair, encode_name_pair};
use crate::tablet::{row_from_kv, Tablet, TabletRow};

const KA_PREFIX: &str = "ka";

/// Tablet of the accounts reachable from one public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAccountTablet(String);

impl KeyAccountTablet {
    pub fn new(public_key: &str) -> Self {
        KeyAccountTablet(format!("{}/{}", KA_PREFIX, public_key))
    }

    pub(crate) fn from_key(tablet_key: &str) -> Result<Self, TabletError> {
        let public_key = tablet_key
            .strip_prefix("ka/")
            .ok_or_else(|| TabletError::UnknownCollection(tablet_key.to_string()))?;
        if public_key.is_empty() {
            return Err(TabletError::InvalidKey(
                tablet_key.to_string(),
                "expected a public key part".to_string(),
            ));
        }
        Ok(KeyAccountTablet(tablet_key.to_string()))
    }

    /// Public key this tablet indexes.
    pub fn public_key(&self) -> &str {
        &self.0[KA_PREFIX.len() + 1..]
    }

    pub fn new_row(
        &self,
        block_num: u32,
        account: &str,
        permission: &str,
        is_deletion: bool,
    ) -> TabletRow {
        let payload = if is_deletion { Vec::new() } else { vec![1u8] };

        TabletRow::new(
            KA_PREFIX,
            self.0.clone(),
            block_num,
            format!("{}:{}", account, permission),
            payload,
        )
    }
}

impl fmt::Display for KeyAccountTablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Tablet for KeyAccountTablet {
    fn collection(&self) -> &'static str {
        KA_PREFIX
    }

    fn key(&self) -> &str {
        &self.0
    }

    fn new_row_from_kv(&self, key: &str, value: &[u8]) -> Result<TabletRow, TabletError> {
        if value.len() > 1 {
            return Err(TabletError::InvalidPayload(
                key.to_string(),
                "key account row value should be empty (deletion) or 1 presence byte".to_string(),
            ));
        }
        row_from_kv(KA_PREFIX, key, value)
    }

    fn primary_key_byte_count(&self) -> usize {
        16
    }

    fn encode_primary_key(&self, buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
        encode_name_pair(buffer, primary_key)
    }

    fn decode_primary_key(&self, buffer: &[u8]) -> Result<String, TabletError> {
        decode_name_pair(buffer)
    }
}

/// Typed view over a key account [`TabletRow`].
pub struct KeyAccountRow<'a>(&'a TabletRow);

impl<'a> KeyAccountRow<'a> {
    pub fn new(row: &'a TabletRow) -> Result<Self, TabletError> {
        if row.collection() != KA_PREFIX {
            return Err(TabletError::InvalidKey(
                row.key(),
                "not a key account row".to_string(),
            ));
        }
        Ok(KeyAccountRow(row))
    }

    pub fn account(&self) -> &str {
        self.0
            .primary_key()
            .split_once(':')
            .map(|(a, _)| a)
            .unwrap_or_default()
    }

    pub fn permission(&self) -> &str {
        self.0
            .primary_key()
            .split_once(':')
            .map(|(_, p)| p)
            .unwrap_or_default()
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
        let tablet = KeyAccountTablet::new("EOS5MHPYyhjBjnQZejzZHqHewPWhGTfQWSVTWYEhDmJu4SXkzgweP");
        let row = tablet.new_row(0, "eosio", "active", false);
        assert_eq!(
            row.key(),
            "ka/EOS5MHPYyhjBjnQZejzZHqHewPWhGTfQWSVTWYEhDmJu4SXkzgweP/00000000/eosio:active"
        );
    }

    #[test]
    fn test_account_permission_view() {
        let tablet = KeyAccountTablet::new("EOS5MHPY");
        let row = tablet.new_row(4, "eosio", "active", false);
        let view = KeyAccountRow::new(&row).unwrap();
        assert_eq!(view.account(), "eosio");
        assert_eq!(view.permission(), "active");
        assert!(!row.is_deletion());
    }
}
