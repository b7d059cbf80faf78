// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Block identifiers and references.
//!
//! A [`BlockRef`] is the `(block_num, block_id)` pair used everywhere a
//! position on the chain must be named. Ordering is by number first, then
//! id bytes, so refs are totally ordered even across forks.

use std::fmt;
use std::str::FromStr;

use fluxdb_serialization::{
    Deserializer, SerializeError, Serializer, U32BEDeserializer, U32BESerializer,
};
use nom::bytes::complete::take;
use nom::error::{context, ContextError, ParseError};
use nom::IResult;

use crate::error::ModelsError;

/// Size in bytes of a block id.
pub const BLOCK_ID_SIZE_BYTES: usize = 32;

/// 32-byte block identifier, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId([u8; BLOCK_ID_SIZE_BYTES]);

impl BlockId {
    pub fn from_bytes(bytes: [u8; BLOCK_ID_SIZE_BYTES]) -> Self {
        BlockId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_ID_SIZE_BYTES] {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for BlockId {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| ModelsError::InvalidBlockId(e.to_string()))?;
        let bytes: [u8; BLOCK_ID_SIZE_BYTES] = raw
            .try_into()
            .map_err(|_| ModelsError::InvalidBlockId(format!("wrong length for id {:?}", s)))?;
        Ok(BlockId(bytes))
    }
}

/// A position on the chain: block number plus block id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockRef {
    /// Block number.
    pub num: u32,
    /// Block id.
    pub id: BlockId,
}

impl BlockRef {
    pub fn new(num: u32, id: BlockId) -> Self {
        BlockRef { num, id }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.num, self.id)
    }
}

/// Serializer for `BlockRef`: `u32` big-endian number followed by the raw
/// 32 id bytes. This is the value format of the last-written-block
/// metadata entry.
#[derive(Clone, Default)]
pub struct BlockRefSerializer {
    u32_serializer: U32BESerializer,
}

impl BlockRefSerializer {
    pub fn new() -> Self {
        Self {
            u32_serializer: U32BESerializer::new(),
        }
    }
}

impl Serializer<BlockRef> for BlockRefSerializer {
    fn serialize(&self, value: &BlockRef, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u32_serializer.serialize(&value.num, buffer)?;
        buffer.extend_from_slice(value.id.as_bytes());
        Ok(())
    }
}

/// Deserializer for `BlockRef`.
#[derive(Clone, Default)]
pub struct BlockRefDeserializer {
    u32_deserializer: U32BEDeserializer,
}

impl BlockRefDeserializer {
    pub fn new() -> Self {
        Self {
            u32_deserializer: U32BEDeserializer::new(),
        }
    }
}

impl Deserializer<BlockRef> for BlockRefDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockRef, E> {
        context("Failed BlockRef deserialization", |input: &'a [u8]| {
            let (rest, num) = self.u32_deserializer.deserialize(input)?;
            let (rest, id_bytes) = take(BLOCK_ID_SIZE_BYTES)(rest)?;
            let id = BlockId::from_bytes(
                id_bytes
                    .try_into()
                    .expect("take() returned a slice of the wrong length"),
            );
            Ok((rest, BlockRef::new(num, id)))
        })(buffer)
    }
}
