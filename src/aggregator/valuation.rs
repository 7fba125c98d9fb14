//! USD valuation arithmetic
//!
//! Token amounts stay in `U256` until the final decimal rescale; only the
//! price multiplication happens in floating point.

use alloy_primitives::utils::format_units;
use alloy_primitives::U256;

use crate::errors::{KeeperError, KeeperResult};

/// 52 weeks, the reward year used by the registry
pub const SECONDS_PER_YEAR: u64 = 60 * 60 * 24 * 7 * 52;

/// Registry stores USD amounts as 18-decimal fixed point
pub const REGISTRY_DECIMALS: usize = 18;

/// `rate * SECONDS_PER_YEAR` in base units
pub fn yearly_amount(reward_rate: U256) -> KeeperResult<U256> {
    reward_rate
        .checked_mul(U256::from(SECONDS_PER_YEAR))
        .ok_or(KeeperError::Overflow("yearly reward amount"))
}

/// `(amount / 10^decimals) * price_usd`
///
/// The division is an exact decimal shift, so no precision is lost before
/// the single float conversion.
pub fn usd_value(amount: U256, decimals: u8, price_usd: f64) -> KeeperResult<f64> {
    let units: f64 = format_units(amount, decimals)
        .map_err(|_| KeeperError::Overflow("decimal rescale"))?
        .parse()
        .map_err(|_| KeeperError::Overflow("decimal rescale"))?;
    Ok(units * price_usd)
}

/// `balance * staked / supply` with integer division; zero supply is zero share
pub fn staked_share(balance: U256, staked: U256, supply: U256) -> KeeperResult<U256> {
    if supply.is_zero() {
        return Ok(U256::ZERO);
    }
    balance
        .checked_mul(staked)
        .map(|product| product / supply)
        .ok_or(KeeperError::Overflow("staked pool share"))
}

/// Encode a USD amount as 18-decimal fixed point, rounding toward zero.
///
/// Digits past the 18th decimal are truncated. Values that do not fit a
/// `uint256` are rejected rather than clamped.
pub fn to_fixed_point(usd: f64) -> KeeperResult<U256> {
    if usd.is_nan() {
        return Err(KeeperError::FixedPoint { value: usd, reason: "not a number" });
    }
    if usd.is_infinite() {
        return Err(KeeperError::FixedPoint { value: usd, reason: "infinite" });
    }
    if usd < 0.0 {
        return Err(KeeperError::FixedPoint { value: usd, reason: "negative" });
    }
    if usd == 0.0 {
        return Ok(U256::ZERO);
    }

    // f64 Display never uses exponent notation
    let text = usd.to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut digits = String::with_capacity(whole.len() + REGISTRY_DECIMALS);
    digits.push_str(whole);
    digits.extend(fraction.chars().take(REGISTRY_DECIMALS));
    for _ in fraction.len()..REGISTRY_DECIMALS {
        digits.push('0');
    }

    U256::from_str_radix(&digits, 10).map_err(|_| KeeperError::FixedPoint {
        value: usd,
        reason: "exceeds uint256",
    })
}
