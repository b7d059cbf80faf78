// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Account-name codec.
//!
//! Chain names (`eosio.token`, `alice`, ...) travel on the wire as
//! big-endian `u64` values using the base32 scheme of the upstream chain:
//! 12 characters of 5 bits each over the alphabet `.12345a-z`, plus an
//! optional 13th character restricted to the first 16 symbols.

use crate::error::ModelsError;

const NAME_CHARS: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";
const MAX_NAME_LEN: usize = 13;

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

/// Encode a textual name into its `u64` representation.
///
/// The empty string encodes to `0`, mirroring the upstream convention for
/// absent names (e.g. an unset payer).
pub fn name_to_u64(name: &str) -> Result<u64, ModelsError> {
    let bytes = name.as_bytes();
    if bytes.len() > MAX_NAME_LEN {
        return Err(ModelsError::InvalidName(format!(
            "name {:?} is longer than {} characters",
            name, MAX_NAME_LEN
        )));
    }

    let mut value: u64 = 0;
    for (i, &c) in bytes.iter().enumerate() {
        let symbol = char_to_symbol(c).ok_or_else(|| {
            ModelsError::InvalidName(format!("name {:?} contains invalid character", name))
        })?;

        if i < 12 {
            value |= (symbol & 0x1F) << (64 - 5 * (i + 1));
        } else {
            if symbol > 0x0F {
                return Err(ModelsError::InvalidName(format!(
                    "13th character of name {:?} out of range",
                    name
                )));
            }
            value |= symbol & 0x0F;
        }
    }

    Ok(value)
}

/// Decode a `u64` name back to its textual form, trailing dots trimmed.
pub fn u64_to_name(value: u64) -> String {
    let mut chars = [b'.'; MAX_NAME_LEN];
    let mut tmp = value;

    for i in 0..MAX_NAME_LEN {
        let mask: u64 = if i == 0 { 0x0F } else { 0x1F };
        chars[MAX_NAME_LEN - 1 - i] = NAME_CHARS[(tmp & mask) as usize];
        tmp >>= if i == 0 { 4 } else { 5 };
    }

    let text = String::from_utf8_lossy(&chars).into_owned();
    text.trim_end_matches('.').to_string()
}

/// Check whether `name` is a well-formed chain name.
pub fn is_valid_name(name: &str) -> bool {
    name_to_u64(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_name_values() {
        // Reference vectors from the upstream chain libraries.
        assert_eq!(name_to_u64("eosio").unwrap(), 0x5530EA0000000000);
        assert_eq!(name_to_u64("").unwrap(), 0);
        assert_eq!(u64_to_name(0x5530EA0000000000), "eosio");
    }

    #[test]
    fn test_name_round_trip() {
        for name in ["alice", "eosio.token", "accounts", "a", "zzzzzzzzzzzz"] {
            let value = name_to_u64(name).unwrap();
            assert_eq!(u64_to_name(value), name, "round trip of {:?}", name);
        }
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(name_to_u64("UPPER").is_err());
        assert!(name_to_u64("has space").is_err());
        assert!(name_to_u64("waaaaaaaytoolongname").is_err());
        // 13th character is restricted to the first 16 symbols.
        assert!(name_to_u64("zzzzzzzzzzzzz").is_err());
        assert!(name_to_u64("aaaaaaaaaaaaj").is_ok());
    }
}
