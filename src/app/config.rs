// SPDX-License-Identifier: MIT

use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::domain::constants::{
    CHAIN_ETHEREUM, DEFAULT_RECEIPT_POLL_MS, DEFAULT_RECEIPT_TIMEOUT_MS,
};
use crate::domain::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    #[serde(default)]
    pub debug: bool,

    // Identity. The service must not run without a signing key.
    pub wallet_key: String,
    pub default_payout_address: Address,

    // Network
    pub http_provider: String,
    /// Independent endpoint used only for divergence checks.
    pub secondary_http_provider: Option<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    // HTTP surface
    #[serde(default = "default_bind")]
    pub bind: String,

    // Persistence
    pub database_url: Option<String>,
    #[serde(default)]
    pub opening_earnings_fiat: f64,

    // Authorization gate for the two-factor-auth strategy.
    pub approval_token: Option<String>,

    // Receipts
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
}

fn default_chain_id() -> u64 {
    CHAIN_ETHEREUM
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_receipt_poll_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_MS
}

fn default_receipt_timeout_ms() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT_MS
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected) = path {
            builder = builder.add_source(File::from(Path::new(selected)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Precedence: env/.env over the config file.
        builder = builder.add_source(Environment::default());

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.wallet_key.trim().is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".to_string()));
        }
        if self.http_provider.trim().is_empty() {
            return Err(AppError::Config("HTTP_PROVIDER is missing".to_string()));
        }
        if self.receipt_poll_ms == 0 || self.receipt_timeout_ms < self.receipt_poll_ms {
            return Err(AppError::Config(
                "receipt_timeout_ms must be at least receipt_poll_ms (> 0)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| "sqlite://treasury.db".to_string())
    }
}
