// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown withdrawal strategy: {0}")]
    InvalidStrategy(String),

    #[error("Destination address {0} is invalid")]
    InvalidDestination(String),

    #[error("Amount must be a finite, non-negative number (got {0})")]
    NegativeAmount(f64),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Balance divergence between providers. Primary: {primary}, Secondary: {secondary}")]
    BalanceDivergence { primary: String, secondary: String },

    #[error("Post-transfer validation failed for {hash}: balance did not decrease")]
    PostTransferValidation { hash: String },

    #[error("Withdrawal not authorized: approval token missing or invalid")]
    AuthorizationDenied,

    #[error("Transaction {hash} reverted on-chain")]
    TransactionReverted { hash: String },

    #[error("Transaction {hash} submitted but unconfirmed within the receipt window")]
    PendingUnconfirmed { hash: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code surfaced in JSON failure bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Initialization(_) => "initialization",
            AppError::Connection(_) => "network_failure",
            AppError::Database(_) => "database",
            AppError::InvalidStrategy(_) => "invalid_strategy",
            AppError::InvalidDestination(_) => "invalid_destination",
            AppError::NegativeAmount(_) => "negative_amount",
            AppError::Validation { .. } => "validation",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::BalanceDivergence { .. } => "balance_divergence",
            AppError::PostTransferValidation { .. } => "post_transfer_validation_failed",
            AppError::AuthorizationDenied => "authorization_denied",
            AppError::TransactionReverted { .. } => "transaction_reverted",
            AppError::PendingUnconfirmed { .. } => "pending_unconfirmed",
            AppError::Unknown(_) => "unknown",
        }
    }

    /// Hash of the on-chain settlement record, when the failure carries one.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            AppError::PostTransferValidation { hash }
            | AppError::TransactionReverted { hash }
            | AppError::PendingUnconfirmed { hash } => Some(hash),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}
