// SPDX-License-Identifier: MIT

use alloy::primitives::U256;

/// Approximate ETH value for display and fiat math. Goes through a string
/// parse so very large accumulators do not overflow u64.
pub fn wei_to_eth(value: U256) -> f64 {
    let num = value.to_string().parse::<f64>().unwrap_or(0.0);
    num / 1e18
}

/// Floors a native-unit amount to wei. Returns `None` for non-finite or
/// non-positive input.
pub fn eth_to_wei(value_eth: f64) -> Option<U256> {
    if !value_eth.is_finite() || value_eth <= 0.0 {
        return None;
    }
    let wei = (value_eth * 1e18).floor();
    if !wei.is_finite() || wei <= 0.0 {
        return None;
    }
    Some(U256::from(wei.min(u128::MAX as f64) as u128))
}
