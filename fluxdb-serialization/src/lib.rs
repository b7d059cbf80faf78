// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Serialization primitives shared by every FluxDB crate.
//!
//! All persisted binary formats (block references, table index snapshots)
//! go through the [`Serializer`] / [`Deserializer`] trait pair so that the
//! encoding of a type lives in exactly one place and deserialization errors
//! carry nom-style context about where the parse failed.

use std::{
    collections::VecDeque,
    fmt::{Debug, Display},
};

use displaydoc::Display;
use nom::{
    error::{context, ContextError, ParseError},
    IResult,
};
use thiserror::Error;

#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// General error {0}
    GeneralError(String),
    /// String too big {0}
    StringTooBig(String),
}

/// Error accumulated while deserializing a buffer, oldest context last.
#[derive(Clone, Error)]
pub struct DeserializeError<'a> {
    errors: VecDeque<(&'a [u8], String)>,
}

impl<'a> ContextError<&'a [u8]> for DeserializeError<'a> {
    fn add_context(input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.errors.push_front((input, ctx.to_string()));
        other
    }
}

impl<'a> ParseError<&'a [u8]> for DeserializeError<'a> {
    fn append(input: &'a [u8], kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other
            .errors
            .push_front((input, kind.description().to_string()));
        other
    }
    fn from_error_kind(input: &'a [u8], kind: nom::error::ErrorKind) -> Self {
        let mut errors = VecDeque::new();
        errors.push_front((input, kind.description().to_string()));
        Self { errors }
    }
    fn from_char(input: &'a [u8], _: char) -> Self {
        Self::from_error_kind(input, nom::error::ErrorKind::Char)
    }
    fn or(self, other: Self) -> Self {
        other
    }
}

impl<'a> Display for DeserializeError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.errors {
            write!(f, "{} / ", error.1)?;
        }
        Ok(())
    }
}

impl<'a> Debug for DeserializeError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut last_input = None;
        for error in &self.errors {
            write!(f, "{} / ", error.1)?;
            last_input = Some(error.0);
        }
        if let Some(last_input) = last_input {
            writeln!(f, "Input: {:?}", last_input)?;
        }
        Ok(())
    }
}

/// Trait defining how a type is decoded from a byte buffer.
///
/// Implemented on dedicated deserializer objects so that range constraints
/// and sub-deserializers are built once and reused.
pub trait Deserializer<T> {
    /// Deserialize a value `T` from a buffer of `u8`.
    ///
    /// Returns the unconsumed rest of the buffer alongside the value.
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

/// Trait defining how a type is encoded into a byte buffer.
pub trait Serializer<T> {
    /// Serialize a value `T` by appending its encoding to `buffer`.
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

macro_rules! gen_fixed_be {
    ($($type:ident, $size:expr, $s:ident, $ds:ident, $nom_fn:path, $d:expr);*) => {
        $(
            #[doc = " Serializer for "]
            #[doc = $d]
            #[doc = " as fixed-width big-endian bytes."]
            #[derive(Clone)]
            pub struct $s;

            impl $s {
                #[allow(dead_code)]
                pub const fn new() -> Self {
                    Self
                }
            }

            impl Default for $s {
                fn default() -> $s {
                    $s::new()
                }
            }

            impl Serializer<$type> for $s {
                fn serialize(&self, value: &$type, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
                    buffer.extend_from_slice(&value.to_be_bytes());
                    Ok(())
                }
            }

            #[doc = " Deserializer for "]
            #[doc = $d]
            #[doc = " from fixed-width big-endian bytes."]
            #[derive(Clone)]
            pub struct $ds;

            impl $ds {
                #[allow(dead_code)]
                pub const fn new() -> Self {
                    Self
                }
            }

            impl Default for $ds {
                fn default() -> $ds {
                    $ds::new()
                }
            }

            impl Deserializer<$type> for $ds {
                fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
                    &self,
                    buffer: &'a [u8],
                ) -> IResult<&'a [u8], $type, E> {
                    context(
                        concat!("Failed ", stringify!($type), " deserialization"),
                        $nom_fn,
                    )(buffer)
                }
            }
        )*
    };
}

gen_fixed_be! {
    u32, 4, U32BESerializer, U32BEDeserializer, nom::number::complete::be_u32, "`u32`";
    u64, 8, U64BESerializer, U64BEDeserializer, nom::number::complete::be_u64, "`u64`"
}
