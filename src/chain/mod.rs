//! Chain Reads
//!
//! Responsible for:
//! - Batched read-only queries against farm, pool and token contracts
//! - Connecting the shared HTTP provider
//!
//! Every trait method is one Multicall3 round trip in the live reader.

mod contracts;
mod multicall;

pub use contracts::{IERC20, IFarmRegistry, IMulticall3, IStakingRewards, IUniswapV2Pair, MULTICALL3};
pub use multicall::MulticallReader;

use alloy_primitives::{Address, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use async_trait::async_trait;
use eyre::Result;

use crate::errors::KeeperResult;

/// Connect an HTTP provider that can be shared by readers and writers
pub fn connect(rpc_url: &str) -> Result<DynProvider> {
    Ok(ProviderBuilder::new().connect_http(rpc_url.parse()?).erased())
}

/// One hop in a farm's reward chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmLinkNode {
    /// Staking rewards contract this hop was read from
    pub farm: Address,
    pub reward_token: Address,
    /// LP/pool token staked in the farm
    pub staking_token: Address,
    /// Reward tokens per second, in base units
    pub reward_rate: U256,
    /// Unix time after which rewards stop accruing
    pub period_finish: U256,
}

impl FarmLinkNode {
    pub fn is_active(&self, now: u64) -> bool {
        self.period_finish > U256::from(now)
    }
}

/// A hop plus the pointer to the next distributor, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmLinkRead {
    pub node: FarmLinkNode,
    pub next_hop: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub total_supply: U256,
}

/// Pool metadata plus the pool-token balance held by one staker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolPosition {
    pub info: PoolInfo,
    pub staked: U256,
}

/// Underlying asset balances held by the pool contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub reserve0: U256,
    pub reserve1: U256,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `rewardsToken`, `stakingToken`, `rewardRate`, `periodFinish` and the
    /// next-hop pointer. A reverted or zero next hop is `None`, not an error.
    async fn read_link(&self, farm: Address) -> KeeperResult<FarmLinkRead>;

    /// `token0`, `token1`, `totalSupply` and `balanceOf(holder)` on the pool token
    async fn read_pool(&self, pool: Address, holder: Address) -> KeeperResult<PoolPosition>;

    /// `balanceOf(pool)` on both underlying assets
    async fn read_reserves(&self, pool: &PoolInfo) -> KeeperResult<PoolReserves>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_activity_is_strict() {
        let node = FarmLinkNode {
            farm: Address::ZERO,
            reward_token: Address::ZERO,
            staking_token: Address::ZERO,
            reward_rate: U256::from(1),
            period_finish: U256::from(1_000u64),
        };

        assert!(node.is_active(999));
        assert!(!node.is_active(1_000));
        assert!(!node.is_active(5_000));
    }
}
