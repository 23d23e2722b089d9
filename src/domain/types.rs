// SPDX-License-Identifier: MIT

use alloy::primitives::{B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::AppError;

/// Inbound withdrawal request body. `amount_eth == 0.0` means
/// "maximum safe amount" (sweep).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    #[serde(default)]
    pub amount_eth: f64,
    pub destination: String,
    #[serde(default)]
    pub aux_destination: Option<String>,
}

/// EIP-1559 fee estimate resolved for a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Time-stamped fiat conversion rate from the injected oracle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceQuote {
    pub usd_per_eth: f64,
    pub as_of: DateTime<Utc>,
}

/// Settled result of a single executor invocation. The tx hash is the
/// unique settlement record; no retry ever reuses it.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub tx_hash: B256,
    pub amount_wei: U256,
    pub amount_eth: f64,
    pub amount_fiat: f64,
    pub quote: PriceQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Confirmed,
    Failed,
    Skipped,
}

/// Per-transfer report included in responses; split strategies produce one
/// per leg, everything else exactly one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegReport {
    pub destination: String,
    pub amount_eth: f64,
    pub status: LegStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LegReport {
    pub fn confirmed(destination: String, outcome: &TransferOutcome) -> Self {
        Self {
            destination,
            amount_eth: outcome.amount_eth,
            status: LegStatus::Confirmed,
            tx_hash: Some(format!("{:#x}", outcome.tx_hash)),
            error: None,
        }
    }

    pub fn failed(destination: String, amount_eth: f64, err: &AppError) -> Self {
        Self {
            destination,
            amount_eth,
            status: LegStatus::Failed,
            tx_hash: err.tx_hash().map(str::to_string),
            error: Some(err.to_string()),
        }
    }

    pub fn skipped(destination: String, amount_eth: f64) -> Self {
        Self {
            destination,
            amount_eth,
            status: LegStatus::Skipped,
            tx_hash: None,
            error: None,
        }
    }
}

/// Successful dispatch result, shaped for the HTTP layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawReceipt {
    pub strategy: String,
    pub message: String,
    pub legs: Vec<LegReport>,
    pub fiat_value: f64,
    /// False when the transfer landed on-chain but the fiat counters could
    /// not be updated; the operator must reconcile the drift by hand.
    pub accounting_settled: bool,
}

/// Failed dispatch. Legs already settled before the failure are carried so
/// partial settlement is surfaced, never hidden.
#[derive(Debug)]
pub struct WithdrawFailure {
    pub error: AppError,
    pub legs: Vec<LegReport>,
}

impl From<AppError> for WithdrawFailure {
    fn from(error: AppError) -> Self {
        Self {
            error,
            legs: Vec::new(),
        }
    }
}

/// Accounting snapshot returned by `/status`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingSnapshot {
    pub total_earnings_fiat: f64,
    pub total_withdrawn_fiat: f64,
}
