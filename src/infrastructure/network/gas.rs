// SPDX-License-Identifier: MIT

use alloy::providers::Provider;
use alloy::rpc::types::eth::FeeHistory;
use alloy::rpc::types::BlockNumberOrTag;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::retry::retry_async;
use crate::domain::constants::{FALLBACK_BASE_FEE_WEI, FALLBACK_PRIORITY_FEE_WEI};
use crate::domain::types::FeeQuote;
use crate::infrastructure::network::provider::HttpProvider;

/// Live EIP-1559 fee estimator with a last-good cache. Never errors: when
/// both the live query and the cache are unavailable it falls back to the
/// fixed defaults (50 gwei base, 1 gwei priority).
#[derive(Clone)]
pub struct GasOracle {
    provider: HttpProvider,
    last_good: Arc<Mutex<Option<FeeQuote>>>,
}

impl GasOracle {
    pub fn new(provider: HttpProvider) -> Self {
        Self {
            provider,
            last_good: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn estimate(&self) -> FeeQuote {
        match self.fetch_history().await {
            Ok(history) => match Self::quote_from_history(&history) {
                Some(quote) => {
                    if let Ok(mut guard) = self.last_good.lock() {
                        *guard = Some(quote);
                    }
                    quote
                }
                None => self.cached_or_default(),
            },
            Err(e) => {
                tracing::warn!(target: "rpc", error = %e, "Fee history unavailable, using fallback");
                self.cached_or_default()
            }
        }
    }

    fn cached_or_default(&self) -> FeeQuote {
        if let Ok(guard) = self.last_good.lock() {
            if let Some(quote) = *guard {
                return quote;
            }
        }
        FeeQuote {
            max_fee_per_gas: FALLBACK_BASE_FEE_WEI + FALLBACK_PRIORITY_FEE_WEI,
            max_priority_fee_per_gas: FALLBACK_PRIORITY_FEE_WEI,
        }
    }

    async fn fetch_history(&self) -> Result<FeeHistory, String> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move {
                    provider
                        .get_fee_history(5, BlockNumberOrTag::Latest, &[50.0f64])
                        .await
                }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| e.to_string())
    }

    fn quote_from_history(history: &FeeHistory) -> Option<FeeQuote> {
        let latest_base = history
            .latest_block_base_fee()
            .or_else(|| history.base_fee_per_gas.iter().rev().nth(1).copied())?;

        // Nodes that return zeroes get the classic 12.5% next-block buffer.
        let raw_next = history.next_block_base_fee().unwrap_or(latest_base);
        let next_base = if raw_next == 0 {
            latest_base.saturating_mul(1125) / 1000
        } else {
            raw_next
        };

        let mut tip_sum = 0u128;
        let mut tip_count = 0u128;
        if let Some(rewards) = &history.reward {
            for block_reward in rewards {
                if let Some(r) = block_reward.first() {
                    tip_sum = tip_sum.saturating_add(*r);
                    tip_count += 1;
                }
            }
        }
        let priority = if tip_count > 0 {
            tip_sum / tip_count
        } else {
            FALLBACK_PRIORITY_FEE_WEI
        };

        Some(FeeQuote {
            max_fee_per_gas: next_base.saturating_add(priority),
            max_priority_fee_per_gas: priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(base_fees: Vec<u128>, rewards: Option<Vec<Vec<u128>>>) -> FeeHistory {
        FeeHistory {
            base_fee_per_gas: base_fees,
            gas_used_ratio: vec![0.5; 5],
            oldest_block: 100,
            reward: rewards,
            ..Default::default()
        }
    }

    #[test]
    fn quotes_median_tip_over_next_base() {
        let h = history(
            vec![10_000_000_000, 10_000_000_000, 12_000_000_000],
            Some(vec![vec![1_000_000_000], vec![3_000_000_000]]),
        );
        let quote = GasOracle::quote_from_history(&h).unwrap();
        assert_eq!(quote.max_priority_fee_per_gas, 2_000_000_000);
        assert_eq!(quote.max_fee_per_gas, 12_000_000_000 + 2_000_000_000);
    }

    #[test]
    fn buffers_zero_next_base() {
        let h = history(vec![8_000_000_000, 0], None);
        let quote = GasOracle::quote_from_history(&h).unwrap();
        assert_eq!(
            quote.max_fee_per_gas,
            8_000_000_000u128 * 1125 / 1000 + FALLBACK_PRIORITY_FEE_WEI
        );
    }

    #[test]
    fn empty_history_yields_none() {
        let h = history(vec![], None);
        assert!(GasOracle::quote_from_history(&h).is_none());
    }

    #[tokio::test]
    async fn unreachable_node_falls_back_to_defaults() {
        let provider =
            HttpProvider::new_http(url::Url::parse("http://127.0.0.1:1").unwrap());
        let oracle = GasOracle::new(provider);
        let quote = oracle.estimate().await;
        assert_eq!(
            quote.max_fee_per_gas,
            FALLBACK_BASE_FEE_WEI + FALLBACK_PRIORITY_FEE_WEI
        );
        assert_eq!(quote.max_priority_fee_per_gas, FALLBACK_PRIORITY_FEE_WEI);
    }
}
