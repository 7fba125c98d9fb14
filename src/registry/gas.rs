//! Gas price selection for registry writes
//!
//! Either a fixed configured price, or the node's `eth_gasPrice` clamped to a
//! ceiling. A failed or out-of-range network read falls back to the fixed price.

use alloy_provider::{DynProvider, Provider};
use std::fmt;
use tracing::{debug, warn};

/// Reference deployment pays a flat 0.2 gwei
pub const DEFAULT_GAS_PRICE_GWEI: f64 = 0.2;

/// Ceiling applied to network-sourced prices
pub const DEFAULT_MAX_GAS_GWEI: f64 = 50.0;

pub fn gwei_to_wei(gwei: f64) -> u128 {
    // `as` saturates; negatives and NaN become 0
    (gwei * 1e9).round() as u128
}

fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / 1e9
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPriceSource {
    Fixed(u128),
    Network { ceiling: u128, fallback: u128 },
}

impl Default for GasPriceSource {
    fn default() -> Self {
        GasPriceSource::Fixed(gwei_to_wei(DEFAULT_GAS_PRICE_GWEI))
    }
}

impl fmt::Display for GasPriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasPriceSource::Fixed(wei) => write!(f, "fixed {:.2} gwei", wei_to_gwei(*wei)),
            GasPriceSource::Network { ceiling, .. } => {
                write!(f, "network (max {:.2} gwei)", wei_to_gwei(*ceiling))
            }
        }
    }
}

impl GasPriceSource {
    /// Gas price in wei for the next submission
    pub async fn price(&self, provider: &DynProvider) -> u128 {
        match *self {
            GasPriceSource::Fixed(wei) => wei,
            GasPriceSource::Network { ceiling, fallback } => {
                let fetched = provider.get_gas_price().await.map_err(|e| e.to_string());
                settle(fetched, ceiling, fallback)
            }
        }
    }
}

fn settle(fetched: Result<u128, String>, ceiling: u128, fallback: u128) -> u128 {
    match fetched {
        Ok(0) => {
            warn!("Node reported zero gas price, using fallback {:.2} gwei", wei_to_gwei(fallback));
            fallback
        }
        Ok(wei) if wei > ceiling => {
            warn!(
                "⛽ Network gas {:.2} gwei above ceiling, clamping to {:.2} gwei",
                wei_to_gwei(wei),
                wei_to_gwei(ceiling)
            );
            ceiling
        }
        Ok(wei) => {
            debug!("⛽ Gas from RPC: {:.2} gwei", wei_to_gwei(wei));
            wei
        }
        Err(e) => {
            warn!("RPC gas fetch failed: {}; using fallback {:.2} gwei", e, wei_to_gwei(fallback));
            fallback
        }
    }
}
