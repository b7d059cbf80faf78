// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Row key rendering.
//!
//! Internally `u64` primary keys travel in their canonical 16-hex form;
//! the `key_type` request field picks how they are shown to (and parsed
//! from) the client.

use fluxdb_models::name::{name_to_u64, u64_to_name};

use crate::error::GrpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyConverter {
    Name,
    Hex,
    Uint64,
}

impl KeyConverter {
    pub(crate) fn from_type(key_type: &str) -> Result<Self, GrpcError> {
        match key_type {
            "" | "name" => Ok(KeyConverter::Name),
            "hex" => Ok(KeyConverter::Hex),
            "uint64" => Ok(KeyConverter::Uint64),
            other => Err(GrpcError::InvalidArgument(format!(
                "unknown key type {:?}, wants one of name, hex, uint64",
                other
            ))),
        }
    }

    /// Render a canonical 16-hex primary key for the client.
    pub(crate) fn to_client(&self, canonical: &str) -> Result<String, GrpcError> {
        let value = u64::from_str_radix(canonical, 16).map_err(|e| {
            GrpcError::InternalServerError(format!(
                "stored primary key {:?} is not canonical hex: {}",
                canonical, e
            ))
        })?;

        Ok(match self {
            KeyConverter::Name => u64_to_name(value),
            KeyConverter::Hex => format!("{:016x}", value),
            KeyConverter::Uint64 => format!("{}", value),
        })
    }

    /// Parse a client-supplied primary key into its canonical 16-hex form.
    pub(crate) fn to_canonical(&self, input: &str) -> Result<String, GrpcError> {
        let value = match self {
            KeyConverter::Name => name_to_u64(input)?,
            KeyConverter::Hex => u64::from_str_radix(input, 16).map_err(|e| {
                GrpcError::InvalidArgument(format!("primary key {:?} is not hex: {}", input, e))
            })?,
            KeyConverter::Uint64 => input.parse::<u64>().map_err(|e| {
                GrpcError::InvalidArgument(format!("primary key {:?} is not a u64: {}", input, e))
            })?,
        };

        Ok(format!("{:016x}", value))
    }
}
