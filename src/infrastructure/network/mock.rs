// SPDX-License-Identifier: MIT

//! Scripted gateway for unit tests: balance reads and receipt outcomes are
//! queued up front, submissions are recorded for assertions.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::domain::constants::{FALLBACK_BASE_FEE_WEI, FALLBACK_PRIORITY_FEE_WEI};
use crate::domain::error::AppError;
use crate::domain::types::FeeQuote;

use super::gateway::{ChainGateway, ReceiptStatus, TransferTx};

pub(crate) struct MockGateway {
    signer: Address,
    fees: FeeQuote,
    // Primary balance readings, consumed in order; the last value repeats.
    balances: Mutex<VecDeque<U256>>,
    secondary: Option<U256>,
    nonce: AtomicU64,
    receipts: Mutex<VecDeque<ReceiptStatus>>,
    pub(crate) submissions: Mutex<Vec<TransferTx>>,
}

impl MockGateway {
    pub(crate) fn new(balance: U256) -> Self {
        Self {
            signer: Address::repeat_byte(0xAA),
            fees: FeeQuote {
                max_fee_per_gas: FALLBACK_BASE_FEE_WEI + FALLBACK_PRIORITY_FEE_WEI,
                max_priority_fee_per_gas: FALLBACK_PRIORITY_FEE_WEI,
            },
            balances: Mutex::new(VecDeque::from([balance])),
            secondary: None,
            nonce: AtomicU64::new(7),
            receipts: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_balances(balances: Vec<U256>) -> Self {
        let mut gw = Self::new(U256::ZERO);
        gw.balances = Mutex::new(VecDeque::from(balances));
        gw
    }

    pub(crate) fn with_secondary(mut self, balance: U256) -> Self {
        self.secondary = Some(balance);
        self
    }

    pub(crate) fn script_receipts(self, receipts: Vec<ReceiptStatus>) -> Self {
        *self.receipts.lock().unwrap() = VecDeque::from(receipts);
        self
    }

    pub(crate) fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub(crate) fn sent_values(&self) -> Vec<U256> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.value_wei)
            .collect()
    }

    pub(crate) fn sent_destinations(&self) -> Vec<Address> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.to)
            .collect()
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn balance(&self) -> Result<U256, AppError> {
        let mut guard = self.balances.lock().unwrap();
        if guard.len() > 1 {
            Ok(guard.pop_front().unwrap())
        } else {
            guard.front().copied().ok_or_else(|| {
                AppError::Connection("no scripted balance".into())
            })
        }
    }

    async fn secondary_balance(&self) -> Result<U256, AppError> {
        self.secondary.ok_or_else(|| {
            AppError::Config("No secondary RPC endpoint configured for divergence checks".into())
        })
    }

    async fn fee_quote(&self) -> FeeQuote {
        self.fees
    }

    async fn pending_nonce(&self) -> Result<u64, AppError> {
        Ok(self.nonce.fetch_add(1, Ordering::SeqCst))
    }

    async fn submit(&self, tx: TransferTx) -> Result<B256, AppError> {
        let mut subs = self.submissions.lock().unwrap();
        subs.push(tx);
        let mut bytes = [0u8; 32];
        bytes[31] = subs.len() as u8;
        Ok(B256::from(bytes))
    }

    async fn await_receipt(&self, _hash: B256) -> Result<ReceiptStatus, AppError> {
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ReceiptStatus::ConfirmedSuccess))
    }
}
