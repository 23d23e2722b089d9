// SPDX-License-Identifier: MIT

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

/// Plain single-recipient value transfer.
pub const GAS_LIMIT_TRANSFER: u64 = 21_000;

/// Conservative fixed limit for the contract-interaction strategy variants.
pub const GAS_LIMIT_CONTRACT_CALL: u64 = 50_000;

/// Conservative fixed limit for the consolidation strategy variant.
pub const GAS_LIMIT_CONSOLIDATE: u64 = 75_000;

/// Fee defaults applied when the live estimate is unavailable.
pub const FALLBACK_BASE_FEE_WEI: u128 = 50_000_000_000; // 50 gwei
pub const FALLBACK_PRIORITY_FEE_WEI: u128 = 1_000_000_000; // 1 gwei

/// Priority fee applied by the max-priority strategy variant.
pub const BOOSTED_PRIORITY_FEE_WEI: u128 = 3_000_000_000; // 3 gwei

/// Fee cap applied by the low-base-only strategy variant.
pub const LOW_BASE_FEE_CAP_WEI: u128 = 15_000_000_000; // 15 gwei

// =============================================================================
// WITHDRAWAL SAFETY MARGINS (wei)
// =============================================================================

/// Fixed reserve kept behind after a sweep, covering fee estimation error.
pub const SAFETY_RESERVE_WEI: u128 = 3_000_000_000_000_000; // 0.003 ETH

/// Below this a transfer is not worth sending.
pub const DUST_THRESHOLD_WEI: u128 = 1_000_000_000_000; // 1e-6 ETH

/// Primary/secondary balance readings further apart than this are suspect.
pub const DIVERGENCE_TOLERANCE_WEI: u128 = 1_000_000_000; // 1 gwei

// =============================================================================
// PRICING & RECEIPTS
// =============================================================================

/// Static fiat conversion rate. Explicitly not a live price feed.
pub const STATIC_ETH_USD: f64 = 2_600.0;

pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;
pub const DEFAULT_RECEIPT_TIMEOUT_MS: u64 = 120_000;

pub const CHAIN_ETHEREUM: u64 = 1;
