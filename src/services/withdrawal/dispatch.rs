// SPDX-License-Identifier: MIT

use alloy::primitives::{Address, U256};
use std::str::FromStr;
use std::sync::Arc;

use crate::common::units::{eth_to_wei, wei_to_eth};
use crate::domain::constants::{
    BOOSTED_PRIORITY_FEE_WEI, DIVERGENCE_TOLERANCE_WEI, GAS_LIMIT_CONSOLIDATE,
    GAS_LIMIT_CONTRACT_CALL, GAS_LIMIT_TRANSFER, LOW_BASE_FEE_CAP_WEI,
};
use crate::domain::error::AppError;
use crate::domain::types::{LegReport, WithdrawFailure, WithdrawReceipt, WithdrawRequest};
use crate::infrastructure::data::accounting::AccountingStore;
use crate::infrastructure::network::gateway::ChainGateway;
use crate::services::pricing::PriceOracle;
use crate::services::withdrawal::executor::{TransferExecutor, TransferPlan};

/// The twelve published strategy identifiers. Most are decorative aliases
/// of the standard path; only four behavioral classes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    StandardEoa,
    ContractCall,
    TimedRelease,
    ConsolidateMulti,
    MaxPriority,
    LowBaseOnly,
    LedgerSync,
    TelegramNotify,
    TwoFactorAuth,
    CheckBefore,
    CheckAfter,
    MicroSplit3,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 12] = [
        StrategyKind::StandardEoa,
        StrategyKind::ContractCall,
        StrategyKind::TimedRelease,
        StrategyKind::ConsolidateMulti,
        StrategyKind::MaxPriority,
        StrategyKind::LowBaseOnly,
        StrategyKind::LedgerSync,
        StrategyKind::TelegramNotify,
        StrategyKind::TwoFactorAuth,
        StrategyKind::CheckBefore,
        StrategyKind::CheckAfter,
        StrategyKind::MicroSplit3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::StandardEoa => "standard-eoa",
            StrategyKind::ContractCall => "contract-call",
            StrategyKind::TimedRelease => "timed-release",
            StrategyKind::ConsolidateMulti => "consolidate-multi",
            StrategyKind::MaxPriority => "max-priority",
            StrategyKind::LowBaseOnly => "low-base-only",
            StrategyKind::LedgerSync => "ledger-sync",
            StrategyKind::TelegramNotify => "telegram-notify",
            StrategyKind::TwoFactorAuth => "two-factor-auth",
            StrategyKind::CheckBefore => "check-before",
            StrategyKind::CheckAfter => "check-after",
            StrategyKind::MicroSplit3 => "micro-split-3",
        }
    }

    pub fn descriptor(&self) -> StrategyDescriptor {
        match self {
            StrategyKind::StandardEoa => StrategyDescriptor::default(),
            StrategyKind::ContractCall => StrategyDescriptor {
                gas_limit: GAS_LIMIT_CONTRACT_CALL,
                note: Some("alias of the standard transfer path; no contract is called"),
                ..Default::default()
            },
            StrategyKind::TimedRelease => StrategyDescriptor {
                note: Some("alias of the standard transfer path; no timelock is enforced"),
                ..Default::default()
            },
            StrategyKind::ConsolidateMulti => StrategyDescriptor {
                gas_limit: GAS_LIMIT_CONSOLIDATE,
                note: Some("alias of the standard transfer path; sent as a single sweep"),
                ..Default::default()
            },
            StrategyKind::MaxPriority => StrategyDescriptor {
                priority_fee_override: Some(BOOSTED_PRIORITY_FEE_WEI),
                note: Some("priority fee boosted"),
                ..Default::default()
            },
            StrategyKind::LowBaseOnly => StrategyDescriptor {
                fee_cap_override: Some(LOW_BASE_FEE_CAP_WEI),
                note: Some("fee cap lowered; may wait for a quiet base fee"),
                ..Default::default()
            },
            StrategyKind::LedgerSync => StrategyDescriptor {
                note: Some("alias of the standard transfer path; no ledger integration"),
                ..Default::default()
            },
            StrategyKind::TelegramNotify => StrategyDescriptor {
                note: Some("alias of the standard transfer path; no notification is sent"),
                ..Default::default()
            },
            StrategyKind::TwoFactorAuth => StrategyDescriptor {
                requires_approval: true,
                ..Default::default()
            },
            StrategyKind::CheckBefore => StrategyDescriptor {
                pre_check: PreCheck::BalanceDivergence,
                ..Default::default()
            },
            StrategyKind::CheckAfter => StrategyDescriptor {
                post_check: PostCheck::BalanceDecreased,
                ..Default::default()
            },
            StrategyKind::MicroSplit3 => StrategyDescriptor {
                split: true,
                ..Default::default()
            },
        }
    }
}

impl FromStr for StrategyKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AppError::InvalidStrategy(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCheck {
    None,
    BalanceDivergence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCheck {
    None,
    BalanceDecreased,
}

/// Composable per-strategy parameters resolved from the descriptor table.
#[derive(Debug, Clone)]
pub struct StrategyDescriptor {
    pub gas_limit: u64,
    pub priority_fee_override: Option<u128>,
    pub fee_cap_override: Option<u128>,
    pub requires_approval: bool,
    pub pre_check: PreCheck,
    pub post_check: PostCheck,
    pub split: bool,
    pub note: Option<&'static str>,
}

impl Default for StrategyDescriptor {
    fn default() -> Self {
        Self {
            gas_limit: GAS_LIMIT_TRANSFER,
            priority_fee_override: None,
            fee_cap_override: None,
            requires_approval: false,
            pre_check: PreCheck::None,
            post_check: PostCheck::None,
            split: false,
            note: None,
        }
    }
}

/// Resolves a strategy, runs its checks and transfer legs, and settles the
/// accounting delta on success.
pub struct WithdrawalEngine<G> {
    gateway: Arc<G>,
    executor: TransferExecutor<G>,
    accounting: AccountingStore,
    default_payout: Address,
    approval_token: Option<String>,
}

impl<G: ChainGateway> WithdrawalEngine<G> {
    pub fn new(
        gateway: Arc<G>,
        price: Arc<dyn PriceOracle>,
        accounting: AccountingStore,
        default_payout: Address,
        approval_token: Option<String>,
    ) -> Self {
        let executor = TransferExecutor::new(gateway.clone(), price);
        Self {
            gateway,
            executor,
            accounting,
            default_payout,
            approval_token,
        }
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        StrategyKind::ALL.iter().map(|k| k.as_str()).collect()
    }

    pub async fn dispatch(
        &self,
        kind: StrategyKind,
        req: &WithdrawRequest,
        approval: Option<&str>,
    ) -> Result<WithdrawReceipt, WithdrawFailure> {
        let descriptor = kind.descriptor();

        let (amount_wei, destination) = validate_request(req)?;

        if descriptor.requires_approval {
            self.check_approval(approval)?;
        }

        if descriptor.pre_check == PreCheck::BalanceDivergence {
            self.check_balance_divergence().await?;
        }

        let pre_balance = if descriptor.post_check == PostCheck::BalanceDecreased {
            Some(self.gateway.balance().await.map_err(WithdrawFailure::from)?)
        } else {
            None
        };

        let mut receipt = if descriptor.split {
            self.run_split(kind, req, amount_wei, destination, &descriptor)
                .await?
        } else {
            self.run_single(kind, amount_wei, destination, &descriptor)
                .await?
        };

        if let Some(pre) = pre_balance {
            self.check_balance_decreased(pre, &receipt).await?;
        }

        if let Err(e) = self.accounting.apply_withdrawal(receipt.fiat_value).await {
            tracing::error!(target: "withdraw", error = %e, "Accounting settlement failed");
            receipt.accounting_settled = false;
        }

        Ok(receipt)
    }

    fn check_approval(&self, approval: Option<&str>) -> Result<(), AppError> {
        match (&self.approval_token, approval) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            _ => Err(AppError::AuthorizationDenied),
        }
    }

    /// Compares the primary reading against an independent secondary
    /// connection. Guards against a compromised or lagging primary; no
    /// transfer is attempted on divergence.
    async fn check_balance_divergence(&self) -> Result<(), AppError> {
        let primary = self.gateway.balance().await?;
        let secondary = self.gateway.secondary_balance().await?;
        let diff = primary.abs_diff(secondary);
        if diff > U256::from(DIVERGENCE_TOLERANCE_WEI) {
            tracing::warn!(
                target: "withdraw",
                primary = %primary,
                secondary = %secondary,
                "Provider balance readings diverge; refusing to transfer"
            );
            return Err(AppError::BalanceDivergence {
                primary: primary.to_string(),
                secondary: secondary.to_string(),
            });
        }
        Ok(())
    }

    /// A successful-looking broadcast with no observable balance effect is
    /// suspect; the result is overridden to failure, hash preserved.
    async fn check_balance_decreased(
        &self,
        pre: U256,
        receipt: &WithdrawReceipt,
    ) -> Result<(), WithdrawFailure> {
        let post = self.gateway.balance().await.map_err(WithdrawFailure::from)?;
        if post >= pre {
            let hash = receipt
                .legs
                .first()
                .and_then(|l| l.tx_hash.clone())
                .unwrap_or_default();
            self.journal(receipt.strategy.as_str(), &receipt.legs, "suspect", "suspect")
                .await;
            return Err(WithdrawFailure {
                error: AppError::PostTransferValidation { hash },
                legs: receipt.legs.clone(),
            });
        }
        Ok(())
    }

    async fn run_single(
        &self,
        kind: StrategyKind,
        amount_wei: U256,
        destination: Address,
        descriptor: &StrategyDescriptor,
    ) -> Result<WithdrawReceipt, WithdrawFailure> {
        let plan = TransferPlan {
            amount_wei,
            destination,
            gas_limit: descriptor.gas_limit,
            priority_fee_override: descriptor.priority_fee_override,
            fee_cap_override: descriptor.fee_cap_override,
        };

        match self.executor.execute(&plan).await {
            Ok(outcome) => {
                let leg = LegReport::confirmed(format!("{:#x}", destination), &outcome);
                self.journal(kind.as_str(), std::slice::from_ref(&leg), "confirmed", "failed")
                    .await;
                Ok(WithdrawReceipt {
                    strategy: kind.as_str().to_string(),
                    message: match descriptor.note {
                        Some(note) => format!("withdrawal complete ({})", note),
                        None => "withdrawal complete".to_string(),
                    },
                    fiat_value: outcome.amount_fiat,
                    legs: vec![leg],
                    accounting_settled: true,
                })
            }
            Err(error) => {
                let leg = LegReport::failed(
                    format!("{:#x}", destination),
                    wei_to_eth(amount_wei),
                    &error,
                );
                if error.tx_hash().is_some() {
                    let status = failed_status(&error);
                    self.journal(kind.as_str(), std::slice::from_ref(&leg), "confirmed", status)
                        .await;
                }
                Err(WithdrawFailure {
                    error,
                    legs: vec![leg],
                })
            }
        }
    }

    /// Three sequential legs of amount/3 to [destination, aux, default
    /// payout]. Stops on the first failure; earlier legs stay settled and
    /// later ones are reported as skipped.
    async fn run_split(
        &self,
        kind: StrategyKind,
        req: &WithdrawRequest,
        amount_wei: U256,
        destination: Address,
        descriptor: &StrategyDescriptor,
    ) -> Result<WithdrawReceipt, WithdrawFailure> {
        if amount_wei.is_zero() {
            return Err(WithdrawFailure::from(AppError::Validation {
                field: "amountEth".into(),
                message: "split strategy requires an explicit amount".into(),
            }));
        }
        let aux = req
            .aux_destination
            .as_deref()
            .ok_or_else(|| {
                WithdrawFailure::from(AppError::Validation {
                    field: "auxDestination".into(),
                    message: "split strategy requires an auxiliary destination".into(),
                })
            })
            .and_then(|raw| {
                parse_destination(raw).map_err(WithdrawFailure::from)
            })?;

        let leg_amount = amount_wei / U256::from(3u8);
        let targets = [destination, aux, self.default_payout];

        let mut legs: Vec<LegReport> = Vec::with_capacity(3);
        let mut fiat_total = 0.0;
        let mut failure: Option<AppError> = None;

        for target in targets {
            if failure.is_some() {
                legs.push(LegReport::skipped(
                    format!("{:#x}", target),
                    wei_to_eth(leg_amount),
                ));
                continue;
            }

            // Each leg re-reads balance and nonce under the executor lock,
            // so the signer handle is fresh per leg.
            let plan = TransferPlan {
                amount_wei: leg_amount,
                destination: target,
                gas_limit: descriptor.gas_limit,
                priority_fee_override: descriptor.priority_fee_override,
                fee_cap_override: descriptor.fee_cap_override,
            };
            match self.executor.execute(&plan).await {
                Ok(outcome) => {
                    fiat_total += outcome.amount_fiat;
                    legs.push(LegReport::confirmed(format!("{:#x}", target), &outcome));
                }
                Err(error) => {
                    legs.push(LegReport::failed(
                        format!("{:#x}", target),
                        wei_to_eth(leg_amount),
                        &error,
                    ));
                    failure = Some(error);
                }
            }
        }

        let settled_status = if failure.is_some() { "partial" } else { "confirmed" };
        let failed_leg_status = failure.as_ref().map_or("failed", failed_status);
        self.journal(kind.as_str(), &legs, settled_status, failed_leg_status)
            .await;

        match failure {
            None => Ok(WithdrawReceipt {
                strategy: kind.as_str().to_string(),
                message: "split withdrawal complete (3 legs)".to_string(),
                legs,
                fiat_value: fiat_total,
                accounting_settled: true,
            }),
            Some(error) => {
                // Settle the fiat delta for the legs that did land.
                if fiat_total > 0.0 {
                    if let Err(e) = self.accounting.apply_withdrawal(fiat_total).await {
                        tracing::error!(target: "withdraw", error = %e, "Accounting settlement failed");
                    }
                }
                Err(WithdrawFailure { error, legs })
            }
        }
    }

    async fn journal(&self, strategy: &str, legs: &[LegReport], settled: &str, failed: &str) {
        for leg in legs {
            let Some(hash) = leg.tx_hash.as_deref() else {
                continue;
            };
            let leg_status = match leg.status {
                crate::domain::types::LegStatus::Confirmed => settled,
                crate::domain::types::LegStatus::Failed => failed,
                crate::domain::types::LegStatus::Skipped => continue,
            };
            if let Err(e) = self
                .accounting
                .record_submission(hash, strategy, &leg.destination, leg.amount_eth, leg_status)
                .await
            {
                tracing::warn!(target: "withdraw", error = %e, "Failed to journal submission");
            }
        }
    }
}

fn failed_status(error: &AppError) -> &'static str {
    match error {
        AppError::TransactionReverted { .. } => "reverted",
        AppError::PendingUnconfirmed { .. } => "pending",
        _ => "failed",
    }
}

fn parse_destination(raw: &str) -> Result<Address, AppError> {
    raw.parse::<Address>()
        .map_err(|_| AppError::InvalidDestination(raw.to_string()))
}

fn validate_request(req: &WithdrawRequest) -> Result<(U256, Address), AppError> {
    if !req.amount_eth.is_finite() || req.amount_eth < 0.0 {
        return Err(AppError::NegativeAmount(req.amount_eth));
    }
    let destination = parse_destination(&req.destination)?;
    let amount_wei = if req.amount_eth == 0.0 {
        U256::ZERO
    } else {
        eth_to_wei(req.amount_eth).ok_or(AppError::NegativeAmount(req.amount_eth))?
    };
    Ok((amount_wei, destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::gateway::ReceiptStatus;
    use crate::infrastructure::network::mock::MockGateway;
    use crate::services::pricing::StaticPriceOracle;

    const ONE_ETH: u128 = 1_000_000_000_000_000_000;

    fn request(amount_eth: f64) -> WithdrawRequest {
        WithdrawRequest {
            amount_eth,
            destination: format!("{:#x}", Address::repeat_byte(0x11)),
            aux_destination: Some(format!("{:#x}", Address::repeat_byte(0x22))),
        }
    }

    async fn engine(gateway: Arc<MockGateway>) -> WithdrawalEngine<MockGateway> {
        let accounting = AccountingStore::new("sqlite::memory:", 10_000.0)
            .await
            .unwrap();
        WithdrawalEngine::new(
            gateway,
            Arc::new(StaticPriceOracle::new(2_000.0)),
            accounting,
            Address::repeat_byte(0x33),
            Some("sesame".to_string()),
        )
    }

    #[test]
    fn every_identifier_round_trips() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!(matches!(
            "instant-yolo".parse::<StrategyKind>(),
            Err(AppError::InvalidStrategy(_))
        ));
    }

    #[test]
    fn descriptor_table_matches_behavior_classes() {
        assert_eq!(
            StrategyKind::ContractCall.descriptor().gas_limit,
            GAS_LIMIT_CONTRACT_CALL
        );
        assert_eq!(
            StrategyKind::ConsolidateMulti.descriptor().gas_limit,
            GAS_LIMIT_CONSOLIDATE
        );
        assert!(StrategyKind::TwoFactorAuth.descriptor().requires_approval);
        assert_eq!(
            StrategyKind::CheckBefore.descriptor().pre_check,
            PreCheck::BalanceDivergence
        );
        assert_eq!(
            StrategyKind::CheckAfter.descriptor().post_check,
            PostCheck::BalanceDecreased
        );
        assert!(StrategyKind::MicroSplit3.descriptor().split);
    }

    #[tokio::test]
    async fn plain_withdrawal_settles_accounting() {
        let gateway = Arc::new(MockGateway::new(U256::from(10 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let receipt = eng
            .dispatch(StrategyKind::StandardEoa, &request(1.0), None)
            .await
            .unwrap();
        assert_eq!(receipt.legs.len(), 1);
        assert!((receipt.fiat_value - 2_000.0).abs() < 1e-6);

        let snap = eng.accounting.snapshot().await.unwrap();
        assert!((snap.total_withdrawn_fiat - 2_000.0).abs() < 1e-6);
        assert!((snap.total_earnings_fiat - 8_000.0).abs() < 1e-6);
        assert_eq!(gateway.submission_count(), 1);
    }

    #[tokio::test]
    async fn invalid_destination_fails_before_any_chain_call() {
        let gateway = Arc::new(MockGateway::new(U256::from(10 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let mut req = request(1.0);
        req.destination = "clearly-not-an-address".into();
        let failure = eng
            .dispatch(StrategyKind::StandardEoa, &req, None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::InvalidDestination(_)));
        assert_eq!(gateway.submission_count(), 0);
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let gateway = Arc::new(MockGateway::new(U256::from(10 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let failure = eng
            .dispatch(StrategyKind::StandardEoa, &request(-0.5), None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::NegativeAmount(_)));
        assert_eq!(gateway.submission_count(), 0);
    }

    #[tokio::test]
    async fn two_factor_requires_matching_token() {
        let gateway = Arc::new(MockGateway::new(U256::from(10 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let denied = eng
            .dispatch(StrategyKind::TwoFactorAuth, &request(1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(denied.error, AppError::AuthorizationDenied));

        let denied = eng
            .dispatch(StrategyKind::TwoFactorAuth, &request(1.0), Some("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(denied.error, AppError::AuthorizationDenied));
        assert_eq!(gateway.submission_count(), 0);

        eng.dispatch(StrategyKind::TwoFactorAuth, &request(1.0), Some("sesame"))
            .await
            .unwrap();
        assert_eq!(gateway.submission_count(), 1);
    }

    #[tokio::test]
    async fn divergent_balances_block_the_transfer() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(10 * ONE_ETH)).with_secondary(U256::from(ONE_ETH)),
        );
        let eng = engine(gateway.clone()).await;

        let failure = eng
            .dispatch(StrategyKind::CheckBefore, &request(1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::BalanceDivergence { .. }));
        assert_eq!(gateway.submission_count(), 0);
    }

    #[tokio::test]
    async fn negligible_divergence_is_tolerated() {
        let primary = U256::from(10 * ONE_ETH);
        let gateway =
            Arc::new(MockGateway::new(primary).with_secondary(primary - U256::from(5u8)));
        let eng = engine(gateway.clone()).await;

        eng.dispatch(StrategyKind::CheckBefore, &request(1.0), None)
            .await
            .unwrap();
        assert_eq!(gateway.submission_count(), 1);
    }

    #[tokio::test]
    async fn missing_secondary_is_a_config_error() {
        let gateway = Arc::new(MockGateway::new(U256::from(10 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let failure = eng
            .dispatch(StrategyKind::CheckBefore, &request(1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::Config(_)));
    }

    #[tokio::test]
    async fn unchanged_balance_after_transfer_is_suspect() {
        // Reads: pre-check, executor, post-check; all report the same
        // balance even though the transfer "succeeded".
        let gateway = Arc::new(MockGateway::new(U256::from(10 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let failure = eng
            .dispatch(StrategyKind::CheckAfter, &request(1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            AppError::PostTransferValidation { .. }
        ));
        // The underlying transfer did happen and must stay visible.
        assert_eq!(gateway.submission_count(), 1);
        assert_eq!(failure.legs.len(), 1);
        assert!(failure.legs[0].tx_hash.is_some());
    }

    #[tokio::test]
    async fn decreased_balance_passes_the_post_check() {
        let gateway = Arc::new(MockGateway::with_balances(vec![
            U256::from(10 * ONE_ETH), // pre-check read
            U256::from(10 * ONE_ETH), // executor read
            U256::from(8 * ONE_ETH),  // post-check read
        ]));
        let eng = engine(gateway.clone()).await;

        eng.dispatch(StrategyKind::CheckAfter, &request(1.0), None)
            .await
            .unwrap();
        assert_eq!(gateway.submission_count(), 1);
    }

    #[tokio::test]
    async fn timed_out_submission_is_journaled_as_pending() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(10 * ONE_ETH))
                .script_receipts(vec![ReceiptStatus::UnknownTimeout]),
        );
        let eng = engine(gateway.clone()).await;

        let failure = eng
            .dispatch(StrategyKind::StandardEoa, &request(1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::PendingUnconfirmed { .. }));

        // The transaction may still land, so the journal must not record a
        // terminal status.
        let journal = eng.accounting.recent(10).await.unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].status, "pending");
    }

    #[tokio::test]
    async fn reverted_submission_is_journaled_as_reverted() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(10 * ONE_ETH))
                .script_receipts(vec![ReceiptStatus::ConfirmedRevert]),
        );
        let eng = engine(gateway.clone()).await;

        let failure = eng
            .dispatch(StrategyKind::StandardEoa, &request(1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::TransactionReverted { .. }));

        let journal = eng.accounting.recent(10).await.unwrap();
        assert_eq!(journal[0].status, "reverted");
    }

    #[tokio::test]
    async fn settlement_failure_is_flagged_on_the_receipt() {
        let gateway = Arc::new(MockGateway::new(U256::from(10 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;
        eng.accounting.close().await;

        let receipt = eng
            .dispatch(StrategyKind::StandardEoa, &request(1.0), None)
            .await
            .unwrap();
        assert!(!receipt.accounting_settled);
        assert!(matches!(
            receipt.legs[0].status,
            crate::domain::types::LegStatus::Confirmed
        ));
    }

    #[tokio::test]
    async fn split_sends_three_equal_legs_in_order() {
        let gateway = Arc::new(MockGateway::new(U256::from(100 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let receipt = eng
            .dispatch(StrategyKind::MicroSplit3, &request(9.0), None)
            .await
            .unwrap();
        assert_eq!(receipt.legs.len(), 3);

        let third = U256::from(3 * ONE_ETH);
        assert_eq!(gateway.sent_values(), vec![third, third, third]);
        assert_eq!(
            gateway.sent_destinations(),
            vec![
                Address::repeat_byte(0x11),
                Address::repeat_byte(0x22),
                Address::repeat_byte(0x33),
            ]
        );
        // Three legs of 3 ETH at 2000 USD.
        assert!((receipt.fiat_value - 18_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn split_stops_after_first_failed_leg() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(100 * ONE_ETH)).script_receipts(vec![
                ReceiptStatus::ConfirmedSuccess,
                ReceiptStatus::ConfirmedRevert,
            ]),
        );
        let eng = engine(gateway.clone()).await;

        let failure = eng
            .dispatch(StrategyKind::MicroSplit3, &request(9.0), None)
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            AppError::TransactionReverted { .. }
        ));
        // Leg 3 never reaches the chain.
        assert_eq!(gateway.submission_count(), 2);
        assert_eq!(failure.legs.len(), 3);
        assert_eq!(failure.legs[0].status, crate::domain::types::LegStatus::Confirmed);
        assert_eq!(failure.legs[1].status, crate::domain::types::LegStatus::Failed);
        assert_eq!(failure.legs[2].status, crate::domain::types::LegStatus::Skipped);

        // The settled first leg still moved fiat.
        let snap = eng.accounting.snapshot().await.unwrap();
        assert!((snap.total_withdrawn_fiat - 6_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn split_requires_aux_destination_and_amount() {
        let gateway = Arc::new(MockGateway::new(U256::from(100 * ONE_ETH)));
        let eng = engine(gateway.clone()).await;

        let mut req = request(9.0);
        req.aux_destination = None;
        let failure = eng
            .dispatch(StrategyKind::MicroSplit3, &req, None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::Validation { .. }));

        let failure = eng
            .dispatch(StrategyKind::MicroSplit3, &request(0.0), None)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::Validation { .. }));
        assert_eq!(gateway.submission_count(), 0);
    }
}
