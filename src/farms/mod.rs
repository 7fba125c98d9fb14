//! Farm enumeration
//!
//! Farms come either from a precomputed JSON list or from the registry's
//! historical `FarmInfo` events. Both paths go through [`dedupe_farms`].

mod events;
mod static_list;

pub use events::{EventFarmSource, DEFAULT_FROM_BLOCK, DEFAULT_LOG_BLOCK_RANGE};
pub use static_list::StaticFarmList;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::KeeperResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub name: String,
    pub address: Address,
}

impl std::fmt::Display for Farm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @{:?}", self.name, self.address)
    }
}

#[async_trait]
pub trait FarmSource: Send + Sync {
    async fn farms(&self) -> KeeperResult<Vec<Farm>>;
}

/// Decode a fixed-width `bytes32` name, dropping the NUL padding
pub fn parse_bytes32_name(raw: &B256) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

/// One entry per staking address, first-seen order; later names win
pub fn dedupe_farms(farms: impl IntoIterator<Item = Farm>) -> Vec<Farm> {
    let mut order: Vec<Address> = Vec::new();
    let mut by_address: HashMap<Address, Farm> = HashMap::new();

    for farm in farms {
        if !by_address.contains_key(&farm.address) {
            order.push(farm.address);
        }
        by_address.insert(farm.address, farm);
    }

    order
        .into_iter()
        .filter_map(|addr| by_address.remove(&addr))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bytes32_name() {
        let mut raw = [0u8; 32];
        raw[..8].copy_from_slice(b"CELO-UBE");
        assert_eq!(parse_bytes32_name(&B256::from(raw)), "CELO-UBE");

        assert_eq!(parse_bytes32_name(&B256::ZERO), "");

        let full = B256::from([b'a'; 32]);
        assert_eq!(parse_bytes32_name(&full).len(), 32);
    }

    #[test]
    fn test_dedupe_keeps_order_and_latest_name() {
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);

        let farms = dedupe_farms(vec![
            Farm { name: "old".into(), address: a },
            Farm { name: "b".into(), address: b },
            Farm { name: "new".into(), address: a },
        ]);

        assert_eq!(farms.len(), 2);
        assert_eq!(farms[0], Farm { name: "new".into(), address: a });
        assert_eq!(farms[1].address, b);
    }
}
