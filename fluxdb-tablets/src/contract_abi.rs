// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Contract ABI siglet: an account has at most one ABI at any block, so
//! ABIs are a single value versioned over block numbers. The payload is
//! the packed ABI, opaque to the store.

use std::fmt;

use crate::error::TabletError;
use crate::tablet::{Siglet, SigletEntry};

const ABI_PREFIX: &str = "abi";

/// Siglet of one account's ABI history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAbiSiglet(String);

impl ContractAbiSiglet {
    pub fn new(account: &str) -> Self {
        ContractAbiSiglet(format!("{}/{}", ABI_PREFIX, account))
    }

    pub(crate) fn from_key(siglet_key: &str) -> Result<Self, TabletError> {
        let account = siglet_key
            .strip_prefix("abi/")
            .ok_or_else(|| TabletError::UnknownCollection(siglet_key.to_string()))?;
        if account.is_empty() {
            return Err(TabletError::InvalidKey(
                siglet_key.to_string(),
                "expected an account part".to_string(),
            ));
        }
        Ok(ContractAbiSiglet(siglet_key.to_string()))
    }

    /// Account owning the ABI.
    pub fn account(&self) -> &str {
        &self.0[ABI_PREFIX.len() + 1..]
    }

    pub fn new_entry(&self, block_num: u32, packed_abi: &[u8]) -> SigletEntry {
        SigletEntry::new(self.0.clone(), block_num, packed_abi.to_vec())
    }
}

impl fmt::Display for ContractAbiSiglet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Siglet for ContractAbiSiglet {
    fn collection(&self) -> &'static str {
        ABI_PREFIX
    }

    fn key(&self) -> &str {
        &self.0
    }
}

/// Typed view over an ABI [`SigletEntry`].
pub struct ContractAbiEntry<'a>(&'a SigletEntry);

impl<'a> ContractAbiEntry<'a> {
    pub fn new(entry: &'a SigletEntry) -> Result<Self, TabletError> {
        if !entry.siglet_key().starts_with(ABI_PREFIX) {
            return Err(TabletError::InvalidKey(
                entry.key(),
                "not a contract ABI entry".to_string(),
            ));
        }
        Ok(ContractAbiEntry(entry))
    }

    pub fn packed_abi(&self) -> &[u8] {
        self.0.payload()
    }

    pub fn block_num(&self) -> u32 {
        self.0.block_num()
    }

    pub fn entry(&self) -> &SigletEntry {
        self.0
    }
}
