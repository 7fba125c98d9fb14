//! TVL/APR Aggregation
//!
//! Responsible for:
//! - Walking a farm's reward chain hop by hop
//! - Valuing active reward streams and staked pool liquidity in USD
//! - Deciding whether the farm's figures get published
//!
//! Pure with respect to its inputs: the same chain state, price snapshot and
//! `now` always produce the same [`AggregationResult`].

mod policy;
mod valuation;
mod walker;

pub use policy::{AggregationPolicy, MissingPriceAction, PublishPolicy};
pub use valuation::{
    staked_share, to_fixed_point, usd_value, yearly_amount, REGISTRY_DECIMALS, SECONDS_PER_YEAR,
};
pub use walker::{FarmChainWalker, DEFAULT_MAX_HOPS};

use alloy_primitives::{Address, U256};
use futures::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::{ChainReader, FarmLinkNode};
use crate::errors::{KeeperError, KeeperResult};
use crate::farms::Farm;
use crate::price_index::PriceResolver;
use crate::tokens::TokenAddress;

/// Read-only state shared by every farm in one cycle
#[derive(Debug, Clone)]
pub struct CycleContext {
    /// Unix seconds, captured once at cycle start
    pub now: u64,
    pub resolver: PriceResolver,
}

impl CycleContext {
    pub fn new(now: u64, resolver: PriceResolver) -> Self {
        Self { now, resolver }
    }
}

/// A valuation dropped because its token had no price
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkippedValuation {
    Reward { hop: Address, token: TokenAddress },
    PoolAsset { hop: Address, pool: Address, token: TokenAddress },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub farm: Farm,
    pub tvl_usd: f64,
    pub rewards_usd_per_year: f64,
    /// Hops whose reward period had not finished at `now`
    pub active_reward_hops: usize,
    pub hops: usize,
    /// Last contract in the chain
    pub terminus: Address,
    pub should_publish: bool,
    pub skipped: Vec<SkippedValuation>,
}

impl AggregationResult {
    fn empty(farm: &Farm) -> Self {
        Self {
            farm: farm.clone(),
            tvl_usd: 0.0,
            rewards_usd_per_year: 0.0,
            active_reward_hops: 0,
            hops: 0,
            terminus: farm.address,
            should_publish: false,
            skipped: Vec::new(),
        }
    }

    /// `(tvl, rewards)` in registry fixed point
    pub fn fixed_point(&self) -> KeeperResult<(U256, U256)> {
        Ok((
            to_fixed_point(self.tvl_usd)?,
            to_fixed_point(self.rewards_usd_per_year)?,
        ))
    }
}

#[derive(Clone)]
pub struct TvlAggregator {
    reader: Arc<dyn ChainReader>,
    walker: FarmChainWalker,
    policy: Arc<AggregationPolicy>,
}

impl TvlAggregator {
    pub fn new(reader: Arc<dyn ChainReader>, policy: AggregationPolicy, max_hops: usize) -> Self {
        Self {
            walker: FarmChainWalker::new(reader.clone(), max_hops),
            reader,
            policy: Arc::new(policy),
        }
    }

    pub async fn aggregate(&self, farm: &Farm, ctx: &CycleContext) -> KeeperResult<AggregationResult> {
        let mut result = AggregationResult::empty(farm);
        let mut hops = pin!(self.walker.walk(farm.address));

        while let Some(node) = hops.next().await {
            let node = node?;
            result.hops += 1;
            result.terminus = node.farm;

            if node.is_active(ctx.now) {
                result.active_reward_hops += 1;
                match self.value_rewards(&node, ctx) {
                    Ok(usd) => result.rewards_usd_per_year += usd,
                    Err(KeeperError::MissingPriceData(token)) => {
                        self.on_missing(self.policy.on_missing_reward_price, token)?;
                        warn!("{}: no price for reward token {} at hop {:?}", farm, token, node.farm);
                        result.skipped.push(SkippedValuation::Reward { hop: node.farm, token });
                    }
                    Err(e) => return Err(e),
                }
            } else {
                debug!("{}: hop {:?} reward period finished", farm, node.farm);
            }

            result.tvl_usd += self.value_pool(farm, &node, ctx, &mut result.skipped).await?;
        }

        result.should_publish = self
            .policy
            .should_publish(result.active_reward_hops, result.terminus);

        debug!(
            "{}: {} hops ({} active) tvl=${:.2} rewards=${:.2}/yr",
            farm, result.hops, result.active_reward_hops, result.tvl_usd, result.rewards_usd_per_year
        );

        Ok(result)
    }

    fn value_rewards(&self, node: &FarmLinkNode, ctx: &CycleContext) -> KeeperResult<f64> {
        let price = ctx.resolver.resolve(node.reward_token)?;
        usd_value(yearly_amount(node.reward_rate)?, price.decimals, price.price_usd)
    }

    /// Staked share of both pooled assets held by this hop
    async fn value_pool(
        &self,
        farm: &Farm,
        node: &FarmLinkNode,
        ctx: &CycleContext,
        skipped: &mut Vec<SkippedValuation>,
    ) -> KeeperResult<f64> {
        let position = self.reader.read_pool(node.staking_token, node.farm).await?;
        let reserves = self.reader.read_reserves(&position.info).await?;

        let assets = [
            (position.info.token0, reserves.reserve0),
            (position.info.token1, reserves.reserve1),
        ];

        let mut usd = 0.0;
        for (token, reserve) in assets {
            let share = staked_share(reserve, position.staked, position.info.total_supply)?;
            match ctx.resolver.resolve(token) {
                Ok(price) => usd += usd_value(share, price.decimals, price.price_usd)?,
                Err(KeeperError::MissingPriceData(token)) => {
                    self.on_missing(self.policy.on_missing_pool_price, token)?;
                    warn!("{}: no price for pool asset {} in {:?}", farm, token, position.info.pool);
                    skipped.push(SkippedValuation::PoolAsset {
                        hop: node.farm,
                        pool: position.info.pool,
                        token,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(usd)
    }

    fn on_missing(&self, action: MissingPriceAction, token: TokenAddress) -> KeeperResult<()> {
        match action {
            MissingPriceAction::Skip => Ok(()),
            MissingPriceAction::AbortFarm => Err(KeeperError::MissingPriceData(token)),
        }
    }
}
