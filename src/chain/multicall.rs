//! Multicall3 chain reader
//!
//! Batches each hop's reads into a single `aggregate3` call:
//! - Hop:      5 calls on the staking rewards contract
//! - Pool:     4 calls on the pair contract
//! - Reserves: 2 calls, one per underlying ERC-20

use alloy_primitives::{Address, Bytes};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use alloy_transport::TransportError;
use async_trait::async_trait;
use eyre::Result;
use std::time::Instant;
use tracing::{debug, trace};

use super::contracts::{IMulticall3, IStakingRewards, IUniswapV2Pair, IERC20, MULTICALL3};
use super::{ChainReader, FarmLinkNode, FarmLinkRead, PoolInfo, PoolPosition, PoolReserves};
use crate::errors::{KeeperError, KeeperResult};

pub struct MulticallReader {
    provider: DynProvider,
    multicall: Address,
}

impl MulticallReader {
    pub fn new(rpc_url: &str) -> Result<Self> {
        Ok(Self::with_provider(super::connect(rpc_url)?, MULTICALL3))
    }

    pub fn with_provider(provider: DynProvider, multicall: Address) -> Self {
        Self { provider, multicall }
    }

    /// Execute a Multicall3 batch; every call is allowed to fail individually
    async fn execute_multicall(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> KeeperResult<Vec<IMulticall3::Result>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let expected = calls.len();
        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();

        let tx = TransactionRequest::default()
            .to(self.multicall)
            .input(Bytes::from(calldata).into());

        let raw = self
            .provider
            .call(tx)
            .await
            .map_err(|e: TransportError| KeeperError::chain_read(self.multicall, format!("Multicall3 failed: {}", e)))?;

        let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&raw).map_err(|e| {
            KeeperError::chain_read(self.multicall, format!("Failed to decode multicall result: {}", e))
        })?;

        if decoded.len() != expected {
            return Err(KeeperError::chain_read(
                self.multicall,
                format!("expected {} results, got {}", expected, decoded.len()),
            ));
        }

        trace!("Multicall3: {} calls in {:?}", expected, start.elapsed());
        Ok(decoded)
    }
}

fn call3<C: SolCall>(target: Address, call: C) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        target,
        allowFailure: true,
        callData: call.abi_encode().into(),
    }
}

/// Decode a required result; a revert or malformed payload is a read error
fn required<C: SolCall>(target: Address, result: &IMulticall3::Result) -> KeeperResult<C::Return> {
    if !result.success {
        return Err(KeeperError::chain_read(target, format!("{} reverted", C::SIGNATURE)));
    }
    C::abi_decode_returns(&result.returnData)
        .map_err(|e| KeeperError::chain_read(target, format!("{}: {}", C::SIGNATURE, e)))
}

/// Decode the external distributor pointer. Plain staking contracts revert
/// or return nothing; either, like a zero address, ends the chain.
fn next_hop(result: &IMulticall3::Result) -> Option<Address> {
    if !result.success {
        return None;
    }
    IStakingRewards::externalStakingRewardsCall::abi_decode_returns(&result.returnData)
        .ok()
        .filter(|next| !next.is_zero())
}

#[async_trait]
impl ChainReader for MulticallReader {
    async fn read_link(&self, farm: Address) -> KeeperResult<FarmLinkRead> {
        let calls = vec![
            call3(farm, IStakingRewards::rewardsTokenCall {}),
            call3(farm, IStakingRewards::stakingTokenCall {}),
            call3(farm, IStakingRewards::rewardRateCall {}),
            call3(farm, IStakingRewards::periodFinishCall {}),
            call3(farm, IStakingRewards::externalStakingRewardsCall {}),
        ];
        let results = self.execute_multicall(calls).await?;

        let node = FarmLinkNode {
            farm,
            reward_token: required::<IStakingRewards::rewardsTokenCall>(farm, &results[0])?,
            staking_token: required::<IStakingRewards::stakingTokenCall>(farm, &results[1])?,
            reward_rate: required::<IStakingRewards::rewardRateCall>(farm, &results[2])?,
            period_finish: required::<IStakingRewards::periodFinishCall>(farm, &results[3])?,
        };

        let next_hop = next_hop(&results[4]);

        debug!(
            "Hop {:?}: reward={:?} staking={:?} rate={} finish={} next={:?}",
            farm, node.reward_token, node.staking_token, node.reward_rate, node.period_finish, next_hop
        );

        Ok(FarmLinkRead { node, next_hop })
    }

    async fn read_pool(&self, pool: Address, holder: Address) -> KeeperResult<PoolPosition> {
        let calls = vec![
            call3(pool, IUniswapV2Pair::token0Call {}),
            call3(pool, IUniswapV2Pair::token1Call {}),
            call3(pool, IUniswapV2Pair::totalSupplyCall {}),
            call3(pool, IUniswapV2Pair::balanceOfCall { owner: holder }),
        ];
        let results = self.execute_multicall(calls).await?;

        let info = PoolInfo {
            pool,
            token0: required::<IUniswapV2Pair::token0Call>(pool, &results[0])?,
            token1: required::<IUniswapV2Pair::token1Call>(pool, &results[1])?,
            total_supply: required::<IUniswapV2Pair::totalSupplyCall>(pool, &results[2])?,
        };
        let staked = required::<IUniswapV2Pair::balanceOfCall>(pool, &results[3])?;

        Ok(PoolPosition { info, staked })
    }

    async fn read_reserves(&self, pool: &PoolInfo) -> KeeperResult<PoolReserves> {
        let calls = vec![
            call3(pool.token0, IERC20::balanceOfCall { account: pool.pool }),
            call3(pool.token1, IERC20::balanceOfCall { account: pool.pool }),
        ];
        let results = self.execute_multicall(calls).await?;

        Ok(PoolReserves {
            reserve0: required::<IERC20::balanceOfCall>(pool.token0, &results[0])?,
            reserve1: required::<IERC20::balanceOfCall>(pool.token1, &results[1])?,
        })
    }
}
