// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Core tablet and siglet traits plus the prefix dispatch table.

use std::fmt;

use crate::error::TabletError;
use crate::key::{explode_row_key, explode_siglet_row_key, hex_block_num, hex_rev_block_num};
use crate::{
    AccountResourceLimitTablet, AuthLinkTablet, BlockResourceLimitTablet, ContractAbiSiglet,
    ContractStateTablet, ContractTableScopeTablet, KeyAccountTablet,
};

/// One version of one primary key of a tablet.
///
/// An empty payload is the tombstone: the primary key is deleted from this
/// block onward, until a later non-empty version rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabletRow {
    collection: &'static str,
    tablet_key: String,
    block_num: u32,
    primary_key: String,
    payload: Vec<u8>,
}

impl TabletRow {
    pub(crate) fn new(
        collection: &'static str,
        tablet_key: String,
        block_num: u32,
        primary_key: String,
        payload: Vec<u8>,
    ) -> Self {
        TabletRow {
            collection,
            tablet_key,
            block_num,
            primary_key,
            payload,
        }
    }

    /// Collection prefix of the owning tablet kind.
    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Full key of the owning tablet.
    pub fn tablet_key(&self) -> &str {
        &self.tablet_key
    }

    pub fn block_num(&self) -> u32 {
        self.block_num
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_deletion(&self) -> bool {
        self.payload.is_empty()
    }

    /// Full backend key of this row version.
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.tablet_key,
            hex_block_num(self.block_num),
            self.primary_key
        )
    }
}

/// A logical multi-row table versioned over blocks.
///
/// Each kind carries its whole key story: how rows are keyed, how raw KV
/// entries become rows again, and how primary keys map to the fixed-width
/// bytes of index snapshots. One implementation is the single authority
/// for its kind.
pub trait Tablet: fmt::Display + Send + Sync {
    /// Collection prefix (`cst`, `ctbls`, ...).
    fn collection(&self) -> &'static str;

    /// Full tablet key, prefix included.
    fn key(&self) -> &str;

    /// Key prefix of the rows at `block_num`.
    fn key_at(&self, block_num: u32) -> String {
        format!("{}/{}", self.key(), hex_block_num(block_num))
    }

    /// Full row key for `primary_key` at `block_num`.
    fn key_for_row_at(&self, block_num: u32, primary_key: &str) -> String {
        format!("{}/{}", self.key_at(block_num), primary_key)
    }

    /// Rebuild a row from a raw backend entry, validating the payload.
    fn new_row_from_kv(&self, key: &str, value: &[u8]) -> Result<TabletRow, TabletError>;

    /// Fixed byte width of this kind's primary keys in index snapshots.
    fn primary_key_byte_count(&self) -> usize;

    /// Encode `primary_key` into exactly
    /// [`primary_key_byte_count`](Tablet::primary_key_byte_count) bytes.
    fn encode_primary_key(&self, buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError>;

    /// Decode a primary key from the front of `buffer`.
    fn decode_primary_key(&self, buffer: &[u8]) -> Result<String, TabletError>;
}

/// Shared body of [`Tablet::new_row_from_kv`] implementations: explode the
/// key, check it belongs to `collection`, and rebuild the base row.
pub(crate) fn row_from_kv(
    collection: &'static str,
    key: &str,
    value: &[u8],
) -> Result<TabletRow, TabletError> {
    let exploded = explode_row_key(key)?;
    if exploded.collection != collection {
        return Err(TabletError::InvalidKey(
            key.to_string(),
            format!(
                "key belongs to collection {:?}, expected {:?}",
                exploded.collection, collection
            ),
        ));
    }

    Ok(TabletRow::new(
        collection,
        exploded.tablet_key.to_string(),
        exploded.block_num,
        exploded.primary_key.to_string(),
        value.to_vec(),
    ))
}

/// One version of a single-valued entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigletEntry {
    siglet_key: String,
    block_num: u32,
    payload: Vec<u8>,
}

impl SigletEntry {
    pub(crate) fn new(siglet_key: String, block_num: u32, payload: Vec<u8>) -> Self {
        SigletEntry {
            siglet_key,
            block_num,
            payload,
        }
    }

    pub fn siglet_key(&self) -> &str {
        &self.siglet_key
    }

    pub fn block_num(&self) -> u32 {
        self.block_num
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_deletion(&self) -> bool {
        self.payload.is_empty()
    }

    /// Full backend key of this entry. Siglet rows use the reverse block
    /// number encoding so the latest entry at or before a block is one
    /// forward seek away.
    pub fn key(&self) -> String {
        format!("{}/{}", self.siglet_key, hex_rev_block_num(self.block_num))
    }
}

/// A single-valued tablet: one implicit primary key, versioned over blocks.
pub trait Siglet: fmt::Display + Send + Sync {
    /// Collection prefix (`abi`, ...).
    fn collection(&self) -> &'static str;

    /// Full siglet key, prefix included.
    fn key(&self) -> &str;

    /// Full entry key at `block_num` (reverse block number encoding).
    fn key_at(&self, block_num: u32) -> String {
        format!("{}/{}", self.key(), hex_rev_block_num(block_num))
    }

    /// Rebuild an entry from a raw backend entry.
    fn new_entry_from_kv(&self, key: &str, value: &[u8]) -> Result<SigletEntry, TabletError> {
        let (siglet_key, block_num) = explode_siglet_row_key(key)?;
        if !siglet_key.starts_with(self.collection()) {
            return Err(TabletError::InvalidKey(
                key.to_string(),
                format!("key does not belong to collection {:?}", self.collection()),
            ));
        }

        Ok(SigletEntry::new(
            siglet_key.to_string(),
            block_num,
            value.to_vec(),
        ))
    }
}

/// Resolve a tablet kind from a full tablet key, dispatching on its prefix.
pub fn tablet_for_key(tablet_key: &str) -> Result<Box<dyn Tablet>, TabletError> {
    let prefix = tablet_key.split('/').next().unwrap_or_default();
    match prefix {
        "cst" => Ok(Box::new(ContractStateTablet::from_key(tablet_key)?)),
        "ctbls" => Ok(Box::new(ContractTableScopeTablet::from_key(tablet_key)?)),
        "al" => Ok(Box::new(AuthLinkTablet::from_key(tablet_key)?)),
        "ka" => Ok(Box::new(KeyAccountTablet::from_key(tablet_key)?)),
        "arl" => Ok(Box::new(AccountResourceLimitTablet::from_key(tablet_key)?)),
        "brl" => Ok(Box::new(BlockResourceLimitTablet::from_key(tablet_key)?)),
        _ => Err(TabletError::UnknownCollection(tablet_key.to_string())),
    }
}

/// Resolve a siglet kind from a full siglet key.
pub fn siglet_for_key(siglet_key: &str) -> Result<Box<dyn Siglet>, TabletError> {
    let prefix = siglet_key.split('/').next().unwrap_or_default();
    match prefix {
        "abi" => Ok(Box::new(ContractAbiSiglet::from_key(siglet_key)?)),
        _ => Err(TabletError::UnknownCollection(siglet_key.to_string())),
    }
}
