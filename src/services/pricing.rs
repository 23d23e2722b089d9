// SPDX-License-Identifier: MIT

use chrono::Utc;

use crate::domain::constants::STATIC_ETH_USD;
use crate::domain::types::PriceQuote;

/// Fiat conversion source. The service ships with a static quote only;
/// anything live would need its own staleness and failure handling.
pub trait PriceOracle: Send + Sync {
    fn quote(&self) -> PriceQuote;
}

pub struct StaticPriceOracle {
    usd_per_eth: f64,
}

impl StaticPriceOracle {
    pub fn new(usd_per_eth: f64) -> Self {
        Self { usd_per_eth }
    }
}

impl Default for StaticPriceOracle {
    fn default() -> Self {
        Self::new(STATIC_ETH_USD)
    }
}

impl PriceOracle for StaticPriceOracle {
    fn quote(&self) -> PriceQuote {
        PriceQuote {
            usd_per_eth: self.usd_per_eth,
            as_of: Utc::now(),
        }
    }
}
