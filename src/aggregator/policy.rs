//! Aggregation policies
//!
//! Which missing prices abort a farm, and which farms get published.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPriceAction {
    /// Drop the contribution, keep valuing the farm
    #[default]
    Skip,
    /// Fail the whole farm for this cycle
    AbortFarm,
}

impl FromStr for MissingPriceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(MissingPriceAction::Skip),
            "abort" | "abort_farm" => Ok(MissingPriceAction::AbortFarm),
            other => Err(format!("unknown missing-price action '{}' (skip|abort_farm)", other)),
        }
    }
}

impl fmt::Display for MissingPriceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPriceAction::Skip => write!(f, "skip"),
            MissingPriceAction::AbortFarm => write!(f, "abort_farm"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    /// Publish when at least one hop has an unexpired reward period, or the
    /// chain terminus is on the durable list
    #[default]
    ActiveRewardsOrWhitelisted,
    Always,
}

impl FromStr for PublishPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active_rewards_or_whitelisted" | "active" => Ok(PublishPolicy::ActiveRewardsOrWhitelisted),
            "always" => Ok(PublishPolicy::Always),
            other => Err(format!(
                "unknown publish policy '{}' (active_rewards_or_whitelisted|always)",
                other
            )),
        }
    }
}

impl fmt::Display for PublishPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishPolicy::ActiveRewardsOrWhitelisted => write!(f, "active_rewards_or_whitelisted"),
            PublishPolicy::Always => write!(f, "always"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationPolicy {
    pub on_missing_reward_price: MissingPriceAction,
    pub on_missing_pool_price: MissingPriceAction,
    pub publish: PublishPolicy,
    /// Chain termini kept published without an active reward period
    pub durable_farms: HashSet<Address>,
}

impl AggregationPolicy {
    pub fn with_durable_farms(mut self, farms: impl IntoIterator<Item = Address>) -> Self {
        self.durable_farms.extend(farms);
        self
    }

    pub fn should_publish(&self, active_reward_hops: usize, terminus: Address) -> bool {
        match self.publish {
            PublishPolicy::Always => true,
            PublishPolicy::ActiveRewardsOrWhitelisted => {
                active_reward_hops > 0 || self.durable_farms.contains(&terminus)
            }
        }
    }
}
