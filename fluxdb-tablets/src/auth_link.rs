// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Auth link tablet: one tablet per account, one row per
//! `(contract, action)` pair linked to a permission.
//!
//! Row payload layout: `<permission: u64 BE name>`, empty on deletion.

use std::fmt;

use fluxdb_models::name::{name_to_u64, u64_to_name};

use crate::error::TabletError;
use crate::primary_key::{decode_name_pair, encode_name_pair};
use crate::tablet::{row_from_kv, Tablet, TabletRow};

const AL_PREFIX: &str = "al";
const PERMISSION_BYTES: usize = 8;

/// Tablet of one account's auth links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthLinkTablet(String);

impl AuthLinkTablet {
    pub fn new(account: &str) -> Self {
        AuthLinkTablet(format!("{}/{}", AL_PREFIX, account))
    }

    pub(crate) fn from_key(tablet_key: &str) -> Result<Self, TabletError> {
        let account = tablet_key
            .strip_prefix("al/")
            .ok_or_else(|| TabletError::UnknownCollection(tablet_key.to_string()))?;
        if account.is_empty() {
            return Err(TabletError::InvalidKey(
                tablet_key.to_string(),
                "expected an account part".to_string(),
            ));
        }
        Ok(AuthLinkTablet(tablet_key.to_string()))
    }

    /// Account owning the links.
    pub fn account(&self) -> &str {
        &self.0[AL_PREFIX.len() + 1..]
    }

    pub fn new_row(
        &self,
        block_num: u32,
        contract: &str,
        action: &str,
        permission: &str,
        is_deletion: bool,
    ) -> Result<TabletRow, TabletError> {
        let payload = if is_deletion {
            Vec::new()
        } else {
            name_to_u64(permission)?.to_be_bytes().to_vec()
        };

        Ok(TabletRow::new(
            AL_PREFIX,
            self.0.clone(),
            block_num,
            format!("{}:{}", contract, action),
            payload,
        ))
    }
}

impl fmt::Display for AuthLinkTablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Tablet for AuthLinkTablet {
    fn collection(&self) -> &'static str {
        AL_PREFIX
    }

    fn key(&self) -> &str {
        &self.0
    }

    fn new_row_from_kv(&self, key: &str, value: &[u8]) -> Result<TabletRow, TabletError> {
        if !value.is_empty() && value.len() != PERMISSION_BYTES {
            return Err(TabletError::InvalidPayload(
                key.to_string(),
                "auth link row value should be empty (deletion) or 8 permission bytes".to_string(),
            ));
        }
        row_from_kv(AL_PREFIX, key, value)
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

/// Typed view over an auth link [`TabletRow`].
pub struct AuthLinkRow<'a>(&'a TabletRow);

impl<'a> AuthLinkRow<'a> {
    pub fn new(row: &'a TabletRow) -> Result<Self, TabletError> {
        if row.collection() != AL_PREFIX {
            return Err(TabletError::InvalidKey(
                row.key(),
                "not an auth link row".to_string(),
            ));
        }
        Ok(AuthLinkRow(row))
    }

    pub fn contract(&self) -> &str {
        self.0
            .primary_key()
            .split_once(':')
            .map(|(c, _)| c)
            .unwrap_or_default()
    }

    pub fn action(&self) -> &str {
        self.0
            .primary_key()
            .split_once(':')
            .map(|(_, a)| a)
            .unwrap_or_default()
    }

    /// Permission the `(contract, action)` pair is linked to.
    pub fn permission(&self) -> String {
        let bytes: [u8; PERMISSION_BYTES] = self.0.payload()[..PERMISSION_BYTES]
            .try_into()
            .expect("payload validated at construction");
        u64_to_name(u64::from_be_bytes(bytes))
    }

    pub fn row(&self) -> &TabletRow {
        self.0
    }
}
