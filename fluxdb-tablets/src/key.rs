// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Key codec shared by every tablet and siglet.
//!
//! All keys are ASCII strings so the backend's lexicographic order is the
//! block order:
//!
//! * row key:    `<tablet_key>/<hex_block_num>/<primary_key>`
//! * index key:  `<tablet_key>/<hex_rev_block_num>`
//! * siglet row: `<siglet_key>/<hex_rev_block_num>`
//!
//! Block numbers are 8 lowercase hex digits. Index and siglet keys encode
//! `0xFFFFFFFF - block_num` so that "greatest entry at or before block N"
//! is the first entry at or after the encoding of N in a forward scan.

use crate::error::TabletError;

const HEX_BLOCK_NUM_LEN: usize = 8;

/// Format a block number for row keys (forward order).
pub fn hex_block_num(block_num: u32) -> String {
    format!("{:08x}", block_num)
}

/// Format a block number for index and siglet keys (reverse order).
pub fn hex_rev_block_num(block_num: u32) -> String {
    format!("{:08x}", u32::MAX - block_num)
}

fn parse_hex_block_num(chunk: &str, key: &str) -> Result<u32, TabletError> {
    if chunk.len() != HEX_BLOCK_NUM_LEN || !chunk.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(TabletError::InvalidKey(
            key.to_string(),
            format!("block number chunk {:?} is not 8 hex digits", chunk),
        ));
    }
    u32::from_str_radix(chunk, 16)
        .map_err(|e| TabletError::InvalidKey(key.to_string(), e.to_string()))
}

/// Decode an 8-hex-digit forward block number chunk.
pub fn block_num_from_hex(chunk: &str, key: &str) -> Result<u32, TabletError> {
    parse_hex_block_num(chunk, key)
}

/// Decode an 8-hex-digit reverse block number chunk.
pub fn block_num_from_rev_hex(chunk: &str, key: &str) -> Result<u32, TabletError> {
    Ok(u32::MAX - parse_hex_block_num(chunk, key)?)
}

/// Semantic parts of a row key.
#[derive(Debug, PartialEq, Eq)]
pub struct ExplodedRowKey<'a> {
    /// Collection prefix (`cst`, `al`, ...).
    pub collection: &'a str,
    /// Full tablet key, prefix included.
    pub tablet_key: &'a str,
    /// Block number of this version.
    pub block_num: u32,
    /// Primary key within the tablet.
    pub primary_key: &'a str,
}

/// Explode `<tablet_key>/<hex_block_num>/<primary_key>`.
pub fn explode_row_key(key: &str) -> Result<ExplodedRowKey<'_>, TabletError> {
    let (rest, primary_key) = key.rsplit_once('/').ok_or_else(|| {
        TabletError::InvalidKey(key.to_string(), "expected at least 3 segments".to_string())
    })?;
    let (tablet_key, block_chunk) = rest.rsplit_once('/').ok_or_else(|| {
        TabletError::InvalidKey(key.to_string(), "expected at least 3 segments".to_string())
    })?;
    if tablet_key.is_empty() || primary_key.is_empty() {
        return Err(TabletError::InvalidKey(
            key.to_string(),
            "empty tablet key or primary key".to_string(),
        ));
    }

    let collection = tablet_key.split('/').next().unwrap_or_default();

    Ok(ExplodedRowKey {
        collection,
        tablet_key,
        block_num: block_num_from_hex(block_chunk, key)?,
        primary_key,
    })
}

/// Explode `<tablet_key>/<hex_rev_block_num>` into `(tablet_key, at_block_num)`.
pub fn explode_index_key(key: &str) -> Result<(&str, u32), TabletError> {
    let (tablet_key, block_chunk) = key.rsplit_once('/').ok_or_else(|| {
        TabletError::InvalidKey(key.to_string(), "expected at least 2 segments".to_string())
    })?;

    Ok((tablet_key, block_num_from_rev_hex(block_chunk, key)?))
}

/// Explode `<siglet_key>/<hex_rev_block_num>` into `(siglet_key, block_num)`.
///
/// Same shape as an index key; named separately because callers deal with
/// different families.
pub fn explode_siglet_row_key(key: &str) -> Result<(&str, u32), TabletError> {
    explode_index_key(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_block_num_is_sortable() {
        assert_eq!(hex_block_num(0), "00000000");
        assert_eq!(hex_block_num(255), "000000ff");
        assert!(hex_block_num(99) < hex_block_num(100));
    }

    #[test]
    fn test_hex_rev_block_num_reverses_order() {
        assert_eq!(hex_rev_block_num(u32::MAX), "00000000");
        assert!(hex_rev_block_num(100) < hex_rev_block_num(99));
        assert_eq!(
            block_num_from_rev_hex(&hex_rev_block_num(12345), "k").unwrap(),
            12345
        );
    }

    #[test]
    fn test_explode_row_key_round_trip() {
        let vectors = [
            ("cst/eosio:scope:table", 42, "00000000000000a5"),
            ("ctbls/eosio:table", 0, "alice"),
            ("al/eoscanadacom", 7, "token:transfer"),
            ("brl", 1, "01"),
        ];

        for (tablet_key, block_num, primary_key) in vectors {
            let key = format!(
                "{}/{}/{}",
                tablet_key,
                hex_block_num(block_num),
                primary_key
            );
            let exploded = explode_row_key(&key).unwrap();
            assert_eq!(exploded.tablet_key, tablet_key);
            assert_eq!(exploded.block_num, block_num);
            assert_eq!(exploded.primary_key, primary_key);
            assert_eq!(exploded.collection, tablet_key.split('/').next().unwrap());
        }
    }

    #[test]
    fn test_explode_rejects_malformed_keys() {
        assert!(explode_row_key("cst").is_err());
        assert!(explode_row_key("cst/parts/zzzzzzzz/pk").is_err());
        assert!(explode_row_key("cst/parts/0001/pk").is_err());
        assert!(explode_index_key("noslash").is_err());
    }

    #[test]
    fn test_explode_index_key() {
        let key = format!("cst/eosio:s:t/{}", hex_rev_block_num(500));
        let (tablet_key, at_block) = explode_index_key(&key).unwrap();
        assert_eq!(tablet_key, "cst/eosio:s:t");
        assert_eq!(at_block, 500);
    }
}
