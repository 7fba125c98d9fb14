//! Farm TVL/APR keeper
//!
//! Walks each farm's reward-distributor chain, prices the staked liquidity
//! and reward streams from a subgraph price index, and publishes the USD
//! figures to an on-chain registry on a fixed schedule.

pub mod aggregator;
pub mod chain;
pub mod config;
pub mod errors;
pub mod farms;
pub mod price_index;
pub mod registry;
pub mod scheduler;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{KeeperError, KeeperResult};
