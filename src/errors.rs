//! Error taxonomy for the keeper core
//!
//! Farm-level errors are caught at the scheduler's per-farm boundary and
//! never abort a cycle. `CycleDependency` is the only cycle-level error.

use alloy_primitives::Address;
use std::time::Duration;
use thiserror::Error;

use crate::tokens::TokenAddress;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeeperError {
    /// A read-only contract call failed or returned malformed data
    #[error("chain read failed on {target}: {reason}")]
    ChainRead { target: Address, reason: String },

    /// Token has no entry in the price index snapshot
    #[error("no price data for token {0}")]
    MissingPriceData(TokenAddress),

    /// Reward chain did not terminate within the hop cap
    #[error("reward chain starting at {entry} exceeded {limit} hops")]
    ChainTooLong { entry: Address, limit: usize },

    /// Registry write was rejected (revert, gas, nonce)
    #[error("registry submission for farm {farm} failed: {reason}")]
    Submission { farm: Address, reason: String },

    /// Farm list or price snapshot could not be fetched
    #[error("cycle dependency '{dependency}' unavailable: {reason}")]
    CycleDependency {
        dependency: &'static str,
        reason: String,
    },

    /// USD amount cannot be encoded as 18-decimal fixed point
    #[error("cannot encode {value} USD as fixed point: {reason}")]
    FixedPoint { value: f64, reason: &'static str },

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl KeeperError {
    pub fn chain_read(target: Address, reason: impl std::fmt::Display) -> Self {
        KeeperError::ChainRead {
            target,
            reason: reason.to_string(),
        }
    }

    pub fn submission(farm: Address, reason: impl std::fmt::Display) -> Self {
        KeeperError::Submission {
            farm,
            reason: reason.to_string(),
        }
    }

    pub fn cycle_dependency(dependency: &'static str, reason: impl std::fmt::Display) -> Self {
        KeeperError::CycleDependency {
            dependency,
            reason: reason.to_string(),
        }
    }

    /// True for errors that must end the cycle rather than a single farm
    pub fn is_cycle_level(&self) -> bool {
        matches!(self, KeeperError::CycleDependency { .. })
    }
}

pub type KeeperResult<T> = std::result::Result<T, KeeperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_dependency_errors_are_cycle_level() {
        let dep = KeeperError::cycle_dependency("price index", "HTTP 502");
        assert!(dep.is_cycle_level());

        let farm = KeeperError::ChainTooLong {
            entry: Address::ZERO,
            limit: 50,
        };
        assert!(!farm.is_cycle_level());
        assert!(!KeeperError::Timeout(Duration::from_secs(1)).is_cycle_level());
    }

    #[test]
    fn test_error_messages_name_the_target() {
        let err = KeeperError::submission(Address::ZERO, "nonce too low");
        let msg = err.to_string();
        assert!(msg.contains("nonce too low"));
        assert!(msg.contains("0x0000000000000000000000000000000000000000"));
    }
}
