// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Fixed-width primary key codecs shared by the tablet kinds.
//!
//! Canonical textual forms:
//! * `u64` keys: 16 lowercase hex digits (`%016x`);
//! * name keys: the chain name itself (`eosio.token`);
//! * name pairs: `name:name`;
//! * one-byte keys: 2 lowercase hex digits.

use fluxdb_models::name::{name_to_u64, u64_to_name};

use crate::error::TabletError;

fn invalid(primary_key: &str, reason: impl Into<String>) -> TabletError {
    TabletError::InvalidPrimaryKey(primary_key.to_string(), reason.into())
}

pub(crate) fn encode_hex_u64(buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
    let value = u64::from_str_radix(primary_key, 16)
        .map_err(|e| invalid(primary_key, format!("not a hex u64: {}", e)))?;
    buffer[..8].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub(crate) fn decode_hex_u64(buffer: &[u8]) -> Result<String, TabletError> {
    let bytes: [u8; 8] = buffer
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("", format!("wants 8 bytes, {} left", buffer.len())))?;
    Ok(format!("{:016x}", u64::from_be_bytes(bytes)))
}

pub(crate) fn encode_name(buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
    let value = name_to_u64(primary_key)?;
    buffer[..8].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub(crate) fn decode_name(buffer: &[u8]) -> Result<String, TabletError> {
    let bytes: [u8; 8] = buffer
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("", format!("wants 8 bytes, {} left", buffer.len())))?;
    Ok(u64_to_name(u64::from_be_bytes(bytes)))
}

pub(crate) fn encode_name_pair(buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
    let (first, second) = primary_key
        .split_once(':')
        .ok_or_else(|| invalid(primary_key, "expected 2 chunks separated by ':'"))?;
    encode_name(&mut buffer[..8], first)?;
    encode_name(&mut buffer[8..16], second)?;
    Ok(())
}

pub(crate) fn decode_name_pair(buffer: &[u8]) -> Result<String, TabletError> {
    if buffer.len() < 16 {
        return Err(invalid("", format!("wants 16 bytes, {} left", buffer.len())));
    }
    Ok(format!(
        "{}:{}",
        decode_name(&buffer[..8])?,
        decode_name(&buffer[8..16])?
    ))
}

pub(crate) fn encode_one_byte(buffer: &mut [u8], primary_key: &str) -> Result<(), TabletError> {
    let value = u8::from_str_radix(primary_key, 16)
        .map_err(|e| invalid(primary_key, format!("not a hex byte: {}", e)))?;
    buffer[0] = value;
    Ok(())
}

pub(crate) fn decode_one_byte(buffer: &[u8]) -> Result<String, TabletError> {
    let byte = buffer
        .first()
        .ok_or_else(|| invalid("", "wants 1 byte, 0 left"))?;
    Ok(format!("{:02x}", byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_u64_round_trip() {
        let mut buffer = [0u8; 8];
        encode_hex_u64(&mut buffer, "00000000000000a5").unwrap();
        assert_eq!(decode_hex_u64(&buffer).unwrap(), "00000000000000a5");
        assert!(encode_hex_u64(&mut buffer, "EOS").is_err());
    }

    #[test]
    fn test_name_pair_round_trip() {
        let mut buffer = [0u8; 16];
        encode_name_pair(&mut buffer, "token:transfer").unwrap();
        assert_eq!(decode_name_pair(&buffer).unwrap(), "token:transfer");
        assert!(encode_name_pair(&mut buffer, "nocolon").is_err());
    }

    #[test]
    fn test_one_byte_round_trip() {
        let mut buffer = [0u8; 1];
        encode_one_byte(&mut buffer, "01").unwrap();
        assert_eq!(decode_one_byte(&buffer).unwrap(), "01");
    }
}
