// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Materialized table index snapshots.
//!
//! A [`TableIndex`] maps every live primary key of a tablet to the block
//! number of its most recent version at `at_block_num`, so reads replay
//! history from the snapshot instead of from genesis.
//!
//! Binary layout (bit-level stable):
//! `u32 BE squelched` | 12 reserved zero bytes | repeated
//! `<primary key, fixed width per tablet kind><u32 BE block_num>`.

use std::collections::BTreeMap;

use nom::bytes::complete::take;
use nom::error::{context, ContextError, ParseError};
use nom::number::complete::be_u32;
use nom::IResult;

use fluxdb_serialization::{
    DeserializeError, Deserializer, SerializeError, Serializer,
};

use crate::error::TabletError;
use crate::tablet::Tablet;

const HEADER_BYTES: usize = 16;

/// Snapshot of a tablet's live primary keys at a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableIndex {
    /// Block this snapshot is valid at.
    pub at_block_num: u32,
    /// Number of row writes collapsed into this snapshot since the
    /// previous one. A freshness metric, not a correctness primitive.
    pub squelched: u32,
    /// primary key -> block number of its latest version.
    pub map: BTreeMap<String, u32>,
}

impl TableIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize for persistence under the tablet's reverse-block-num
    /// index key.
    pub fn marshal_binary(&self, tablet: &dyn Tablet) -> Result<Vec<u8>, TabletError> {
        let mut buffer = Vec::new();
        TableIndexSerializer::new(tablet)
            .serialize(self, &mut buffer)
            .map_err(|e| TabletError::InvalidIndex(tablet.key().to_string(), e.to_string()))?;
        Ok(buffer)
    }

    /// Rebuild a snapshot from its binary form.
    pub fn from_binary(
        tablet: &dyn Tablet,
        at_block_num: u32,
        buffer: &[u8],
    ) -> Result<Self, TabletError> {
        let entry_bytes = tablet.primary_key_byte_count() + 4;
        if buffer.len() < HEADER_BYTES || (buffer.len() - HEADER_BYTES) % entry_bytes != 0 {
            return Err(TabletError::InvalidIndex(
                tablet.key().to_string(),
                format!(
                    "{} bytes alignment + {} bytes header is off (has {} bytes)",
                    entry_bytes,
                    HEADER_BYTES,
                    buffer.len()
                ),
            ));
        }

        let (rest, index) = TableIndexDeserializer::new(tablet, at_block_num)
            .deserialize::<DeserializeError>(buffer)
            .map_err(|e| TabletError::InvalidIndex(tablet.key().to_string(), e.to_string()))?;
        if !rest.is_empty() {
            return Err(TabletError::InvalidIndex(
                tablet.key().to_string(),
                format!("{} trailing bytes", rest.len()),
            ));
        }

        Ok(index)
    }
}

/// Serializer for [`TableIndex`], parameterized by the owning tablet kind
/// for the primary key width and codec.
pub struct TableIndexSerializer<'a> {
    tablet: &'a dyn Tablet,
}

impl<'a> TableIndexSerializer<'a> {
    pub fn new(tablet: &'a dyn Tablet) -> Self {
        Self { tablet }
    }
}

impl Serializer<TableIndex> for TableIndexSerializer<'_> {
    fn serialize(&self, value: &TableIndex, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let pk_bytes = self.tablet.primary_key_byte_count();

        buffer.reserve(HEADER_BYTES + (pk_bytes + 4) * value.map.len());
        buffer.extend_from_slice(&value.squelched.to_be_bytes());
        buffer.extend_from_slice(&[0u8; HEADER_BYTES - 4]);

        let mut pk_buffer = vec![0u8; pk_bytes];
        for (primary_key, block_num) in &value.map {
            self.tablet
                .encode_primary_key(&mut pk_buffer, primary_key)
                .map_err(|e| SerializeError::GeneralError(e.to_string()))?;
            buffer.extend_from_slice(&pk_buffer);
            buffer.extend_from_slice(&block_num.to_be_bytes());
        }

        Ok(())
    }
}

/// Deserializer for [`TableIndex`].
pub struct TableIndexDeserializer<'a> {
    tablet: &'a dyn Tablet,
    at_block_num: u32,
}

impl<'a> TableIndexDeserializer<'a> {
    pub fn new(tablet: &'a dyn Tablet, at_block_num: u32) -> Self {
        Self {
            tablet,
            at_block_num,
        }
    }
}

impl Deserializer<TableIndex> for TableIndexDeserializer<'_> {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TableIndex, E> {
        context("Failed TableIndex deserialization", |input: &'a [u8]| {
            let pk_bytes = self.tablet.primary_key_byte_count();

            let (rest, squelched) = be_u32(input)?;
            let (mut rest, _reserved) = take(HEADER_BYTES - 4)(rest)?;

            let mut map = BTreeMap::new();
            while !rest.is_empty() {
                let (after_pk, pk_chunk) = take(pk_bytes)(rest)?;
                let (after_block, block_num) = be_u32(after_pk)?;

                let primary_key = self.tablet.decode_primary_key(pk_chunk).map_err(|_| {
                    nom::Err::Error(ParseError::from_error_kind(
                        rest,
                        nom::error::ErrorKind::Verify,
                    ))
                })?;
                map.insert(primary_key, block_num);
                rest = after_block;
            }

            Ok((
                rest,
                TableIndex {
                    at_block_num: self.at_block_num,
                    squelched,
                    map,
                },
            ))
        })(buffer)
    }
}
