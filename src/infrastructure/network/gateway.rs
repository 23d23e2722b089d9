// SPDX-License-Identifier: MIT

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, TxKind, B256, U256};
use alloy::providers::Provider;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::common::retry::retry_async;
use crate::domain::error::AppError;
use crate::domain::types::FeeQuote;
use crate::infrastructure::network::gas::GasOracle;
use crate::infrastructure::network::provider::HttpProvider;

/// Fully resolved single-recipient value transfer, ready to sign.
#[derive(Debug, Clone)]
pub struct TransferTx {
    pub to: Address,
    pub value_wei: U256,
    pub gas_limit: u64,
    pub fees: FeeQuote,
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    ConfirmedSuccess,
    ConfirmedRevert,
    UnknownTimeout,
}

/// Seam between the withdrawal logic and the network. One instance is
/// constructed at startup and shared; tests substitute a scripted mock.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    fn signer_address(&self) -> Address;

    /// Custodial wallet balance from the primary connection.
    async fn balance(&self) -> Result<U256, AppError>;

    /// Same balance through an independent secondary connection. Errors if
    /// no secondary endpoint is configured.
    async fn secondary_balance(&self) -> Result<U256, AppError>;

    async fn fee_quote(&self) -> FeeQuote;

    async fn pending_nonce(&self) -> Result<u64, AppError>;

    /// Sign and broadcast. Exactly one on-chain submission per call; the
    /// caller never retries a returned hash.
    async fn submit(&self, tx: TransferTx) -> Result<B256, AppError>;

    /// Poll until the network reports inclusion or the receipt window
    /// closes.
    async fn await_receipt(&self, hash: B256) -> Result<ReceiptStatus, AppError>;
}

pub struct RpcGateway {
    primary: HttpProvider,
    secondary: Option<HttpProvider>,
    signer: PrivateKeySigner,
    chain_id: u64,
    gas: GasOracle,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl RpcGateway {
    pub fn new(
        primary: HttpProvider,
        secondary: Option<HttpProvider>,
        signer: PrivateKeySigner,
        chain_id: u64,
        receipt_poll: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        let gas = GasOracle::new(primary.clone());
        Self {
            primary,
            secondary,
            signer,
            chain_id,
            gas,
            receipt_poll,
            receipt_timeout,
        }
    }

    async fn balance_of(provider: &HttpProvider, address: Address) -> Result<U256, AppError> {
        let provider = provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_balance(address).await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Balance check failed: {}", e)))
    }
}

#[async_trait]
impl ChainGateway for RpcGateway {
    fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn balance(&self) -> Result<U256, AppError> {
        Self::balance_of(&self.primary, self.signer.address()).await
    }

    async fn secondary_balance(&self) -> Result<U256, AppError> {
        let secondary = self.secondary.as_ref().ok_or_else(|| {
            AppError::Config("No secondary RPC endpoint configured for divergence checks".into())
        })?;
        Self::balance_of(secondary, self.signer.address()).await
    }

    async fn fee_quote(&self) -> FeeQuote {
        self.gas.estimate().await
    }

    async fn pending_nonce(&self) -> Result<u64, AppError> {
        let provider = self.primary.clone();
        let address = self.signer.address();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }

    async fn submit(&self, tx: TransferTx) -> Result<B256, AppError> {
        let mut typed = TxEip1559 {
            chain_id: self.chain_id,
            nonce: tx.nonce,
            max_priority_fee_per_gas: tx.fees.max_priority_fee_per_gas,
            max_fee_per_gas: tx.fees.max_fee_per_gas,
            gas_limit: tx.gas_limit,
            to: TxKind::Call(tx.to),
            value: tx.value_wei,
            ..Default::default()
        };

        let sig = self
            .signer
            .sign_transaction_sync(&mut typed)
            .map_err(|e| AppError::Initialization(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = typed.into_signed(sig).into();
        let raw = signed.encoded_2718();
        let hash = *signed.tx_hash();

        self.primary
            .send_raw_transaction(raw.as_slice())
            .await
            .map_err(|e| AppError::Connection(format!("Submission failed: {}", e)))?;

        tracing::info!(
            target: "withdraw",
            hash = %format!("{:#x}", hash),
            to = %format!("{:#x}", tx.to),
            value_wei = %tx.value_wei,
            nonce = tx.nonce,
            "Transfer submitted"
        );
        Ok(hash)
    }

    async fn await_receipt(&self, hash: B256) -> Result<ReceiptStatus, AppError> {
        let started = Instant::now();

        loop {
            if started.elapsed() >= self.receipt_timeout {
                return Ok(ReceiptStatus::UnknownTimeout);
            }

            match self.primary.get_transaction_receipt(hash).await {
                Ok(Some(rcpt)) => {
                    if rcpt.status() {
                        return Ok(ReceiptStatus::ConfirmedSuccess);
                    }
                    return Ok(ReceiptStatus::ConfirmedRevert);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        target: "withdraw",
                        error = %e,
                        hash = %format!("{:#x}", hash),
                        "Receipt lookup error; retrying"
                    );
                }
            }

            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}
