//! Token identities and the per-cycle price table entries
//!
//! Every address that is used as a price-table key goes through
//! [`TokenAddress::normalize`] or `From<Address>`, so two spellings of the
//! same address always land on the same entry.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// USD-pegged reference asset of the reference deployment
pub const DEFAULT_STABLE_REFERENCE: Address = address!("0a60c25Ef6021fC3B479914E6bcA7C03c18A97f1");

/// Decimals assumed for the stable reference when the index has no record
pub const DEFAULT_STABLE_DECIMALS: u8 = 18;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid token address '{0}'")]
pub struct InvalidAddress(pub String);

/// Canonical, case-insensitive token identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAddress(Address);

impl TokenAddress {
    /// Parse any textual form: mixed case, checksummed, with or without `0x`
    pub fn normalize(raw: &str) -> Result<Self, InvalidAddress> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidAddress(raw.to_string()));
        }

        Address::from_str(&hex.to_ascii_lowercase())
            .map(TokenAddress)
            .map_err(|_| InvalidAddress(raw.to_string()))
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

impl From<Address> for TokenAddress {
    fn from(address: Address) -> Self {
        TokenAddress(address)
    }
}

impl FromStr for TokenAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string().to_lowercase())
    }
}

/// One price index record, valid for a single cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: TokenAddress,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub derived_price_usd: f64,
}

/// Remaps wrapped/synthetic tokens to the token whose price should be used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    entries: HashMap<TokenAddress, TokenAddress>,
}

impl SubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: TokenAddress, to: TokenAddress) {
        self.entries.insert(from, to);
    }

    /// Parse `from:to,from:to`; blank input yields an empty table
    pub fn parse(raw: &str) -> Result<Self, InvalidAddress> {
        let mut table = Self::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (from, to) = pair
                .split_once(':')
                .ok_or_else(|| InvalidAddress(pair.to_string()))?;
            table.insert(TokenAddress::normalize(from)?, TokenAddress::normalize(to)?);
        }
        Ok(table)
    }

    /// Substitute, or the input itself when no entry exists
    pub fn resolve(&self, token: TokenAddress) -> TokenAddress {
        self.entries.get(&token).copied().unwrap_or(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
