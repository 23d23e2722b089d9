// SPDX-License-Identifier: MIT

use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::common::units::wei_to_eth;
use crate::domain::constants::{DUST_THRESHOLD_WEI, SAFETY_RESERVE_WEI};
use crate::domain::error::AppError;
use crate::domain::types::TransferOutcome;
use crate::infrastructure::network::gateway::{ChainGateway, ReceiptStatus, TransferTx};
use crate::services::pricing::PriceOracle;

/// Per-invocation transfer parameters resolved by the dispatcher.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    /// ZERO means "maximum safe amount" (sweep).
    pub amount_wei: U256,
    pub destination: Address,
    pub gas_limit: u64,
    pub priority_fee_override: Option<u128>,
    pub fee_cap_override: Option<u128>,
}

/// Balance-aware transfer executor. The mutex serializes the whole
/// read-balance → build → submit → wait sequence so concurrent requests
/// cannot race the signer's nonce sequence.
pub struct TransferExecutor<G> {
    gateway: Arc<G>,
    price: Arc<dyn PriceOracle>,
    sequence: Mutex<()>,
}

impl<G: ChainGateway> TransferExecutor<G> {
    pub fn new(gateway: Arc<G>, price: Arc<dyn PriceOracle>) -> Self {
        Self {
            gateway,
            price,
            sequence: Mutex::new(()),
        }
    }

    pub async fn execute(&self, plan: &TransferPlan) -> Result<TransferOutcome, AppError> {
        let _guard = self.sequence.lock().await;

        let balance = self.gateway.balance().await?;
        let mut fees = self.gateway.fee_quote().await;
        if let Some(priority) = plan.priority_fee_override {
            fees.max_priority_fee_per_gas = priority;
            fees.max_fee_per_gas = fees.max_fee_per_gas.max(priority);
        }
        if let Some(cap) = plan.fee_cap_override {
            fees.max_fee_per_gas = fees.max_fee_per_gas.min(cap);
            fees.max_priority_fee_per_gas = fees.max_priority_fee_per_gas.min(cap);
        }

        let final_amount =
            plan_send_amount(balance, fees.max_fee_per_gas, plan.gas_limit, plan.amount_wei)?;

        let nonce = self.gateway.pending_nonce().await?;
        let hash = self
            .gateway
            .submit(TransferTx {
                to: plan.destination,
                value_wei: final_amount,
                gas_limit: plan.gas_limit,
                fees,
                nonce,
            })
            .await?;

        // A failed attempt is never resubmitted here; a resubmission would
        // need a fresh nonce and belongs to the caller.
        match self.gateway.await_receipt(hash).await? {
            ReceiptStatus::ConfirmedSuccess => {
                let amount_eth = wei_to_eth(final_amount);
                let quote = self.price.quote();
                Ok(TransferOutcome {
                    tx_hash: hash,
                    amount_wei: final_amount,
                    amount_eth,
                    amount_fiat: amount_eth * quote.usd_per_eth,
                    quote,
                })
            }
            ReceiptStatus::ConfirmedRevert => Err(AppError::TransactionReverted {
                hash: format!("{:#x}", hash),
            }),
            ReceiptStatus::UnknownTimeout => Err(AppError::PendingUnconfirmed {
                hash: format!("{:#x}", hash),
            }),
        }
    }
}

/// Computes the safe send amount: requested (or sweep) clamped to
/// balance − gas cost − fixed reserve, failing below the dust threshold.
pub(crate) fn plan_send_amount(
    balance: U256,
    max_fee_per_gas: u128,
    gas_limit: u64,
    requested: U256,
) -> Result<U256, AppError> {
    let estimated_cost = U256::from(max_fee_per_gas).saturating_mul(U256::from(gas_limit));
    let overhead = estimated_cost.saturating_add(U256::from(SAFETY_RESERVE_WEI));
    let max_sendable = balance.saturating_sub(overhead);

    let final_amount = if requested.is_zero() {
        max_sendable
    } else {
        requested.min(max_sendable)
    };

    if final_amount.is_zero() || final_amount < U256::from(DUST_THRESHOLD_WEI) {
        return Err(AppError::InsufficientFunds {
            required: U256::from(DUST_THRESHOLD_WEI)
                .saturating_add(overhead)
                .to_string(),
            available: balance.to_string(),
        });
    }

    Ok(final_amount)
}
