//! In-memory doubles for the keeper's I/O traits

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chain::{ChainReader, FarmLinkNode, FarmLinkRead, PoolInfo, PoolPosition, PoolReserves};
use crate::errors::{KeeperError, KeeperResult};
use crate::farms::{Farm, FarmSource};
use crate::price_index::{PriceResolver, PriceSnapshot, PriceSource, StableReference};
use crate::registry::RegistryWriter;
use crate::tokens::{SubstitutionTable, TokenAddress, TokenInfo};

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// `units * 10^18`
pub fn wei(units: u64) -> U256 {
    U256::from(units) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn snapshot_with(prices: &[(Address, u8, f64)]) -> PriceSnapshot {
    let records = prices.iter().map(|(address, decimals, price)| TokenInfo {
        address: TokenAddress::from(*address),
        symbol: String::new(),
        name: String::new(),
        decimals: *decimals,
        derived_price_usd: *price,
    });
    PriceSnapshot::new(records, Utc::now())
}

pub fn resolver_with(prices: &[(Address, u8, f64)]) -> PriceResolver {
    PriceResolver::new(
        Arc::new(snapshot_with(prices)),
        Arc::new(SubstitutionTable::new()),
        StableReference::default(),
    )
}

// ============================================
// CHAIN
// ============================================

#[derive(Default)]
pub struct MockChain {
    links: HashMap<Address, FarmLinkRead>,
    pools: HashMap<Address, (PoolInfo, PoolReserves)>,
    staked: HashMap<(Address, Address), U256>,
    stalled: HashSet<Address>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_link(&mut self, node: FarmLinkNode, next_hop: Option<Address>) {
        self.links.insert(node.farm, FarmLinkRead { node, next_hop });
    }

    /// Zero-rate hops `addr(id)` linked in order; returns their addresses
    pub fn link_chain(&mut self, ids: &[u8], period_finish: u64) -> Vec<Address> {
        let hops: Vec<Address> = ids.iter().map(|id| addr(*id)).collect();
        for (i, hop) in hops.iter().enumerate() {
            self.insert_link(
                FarmLinkNode {
                    farm: *hop,
                    reward_token: addr(0xe0),
                    staking_token: addr(0xf0),
                    reward_rate: U256::ZERO,
                    period_finish: U256::from(period_finish),
                },
                hops.get(i + 1).copied(),
            );
        }
        hops
    }

    pub fn set_next_hop(&mut self, farm: Address, next_hop: Option<Address>) {
        if let Some(link) = self.links.get_mut(&farm) {
            link.next_hop = next_hop;
        }
    }

    pub fn insert_pool(&mut self, info: PoolInfo, reserves: PoolReserves) {
        self.pools.insert(info.pool, (info, reserves));
    }

    pub fn stake(&mut self, pool: Address, holder: Address, amount: U256) {
        self.staked.insert((pool, holder), amount);
    }

    /// Reads of this farm hang far past any test timeout
    pub fn stall(&mut self, farm: Address) {
        self.stalled.insert(farm);
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn read_link(&self, farm: Address) -> KeeperResult<FarmLinkRead> {
        if self.stalled.contains(&farm) {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }
        self.links
            .get(&farm)
            .cloned()
            .ok_or_else(|| KeeperError::chain_read(farm, "rewardsToken() reverted"))
    }

    async fn read_pool(&self, pool: Address, holder: Address) -> KeeperResult<PoolPosition> {
        let (info, _) = self
            .pools
            .get(&pool)
            .ok_or_else(|| KeeperError::chain_read(pool, "token0() reverted"))?;
        let staked = self.staked.get(&(pool, holder)).copied().unwrap_or_default();
        Ok(PoolPosition { info: *info, staked })
    }

    async fn read_reserves(&self, pool: &PoolInfo) -> KeeperResult<PoolReserves> {
        self.pools
            .get(&pool.pool)
            .map(|(_, reserves)| *reserves)
            .ok_or_else(|| KeeperError::chain_read(pool.token0, "balanceOf() reverted"))
    }
}

// ============================================
// CYCLE DEPENDENCIES
// ============================================

pub struct MockPrices {
    snapshot: PriceSnapshot,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl MockPrices {
    pub fn new(snapshot: PriceSnapshot) -> Self {
        Self {
            snapshot,
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPrices {
    async fn snapshot(&self) -> KeeperResult<PriceSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(KeeperError::cycle_dependency("price index", "HTTP 502"));
        }
        Ok(self.snapshot.clone())
    }
}

pub struct MockFarms {
    farms: Option<Vec<Farm>>,
}

impl MockFarms {
    pub fn new(farms: Vec<Farm>) -> Self {
        Self { farms: Some(farms) }
    }

    pub fn failing() -> Self {
        Self { farms: None }
    }
}

#[async_trait]
impl FarmSource for MockFarms {
    async fn farms(&self) -> KeeperResult<Vec<Farm>> {
        self.farms
            .clone()
            .ok_or_else(|| KeeperError::cycle_dependency("farm list", "registry events unavailable"))
    }
}

// ============================================
// REGISTRY
// ============================================

#[derive(Default)]
pub struct RecordingWriter {
    calls: Mutex<Vec<(Address, U256, U256)>>,
    rejected: HashSet<Address>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, farm: Address) -> Self {
        self.rejected.insert(farm);
        self
    }

    pub fn calls(&self) -> Vec<(Address, U256, U256)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RegistryWriter for RecordingWriter {
    async fn update_farm_data(&self, farm: Address, tvl: U256, rewards: U256) -> KeeperResult<TxHash> {
        if self.rejected.contains(&farm) {
            return Err(KeeperError::submission(farm, "nonce too low"));
        }
        let mut calls = self.calls.lock().map_err(|e| KeeperError::submission(farm, e))?;
        calls.push((farm, tvl, rewards));
        Ok(TxHash::with_last_byte(calls.len() as u8))
    }
}
