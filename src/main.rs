// SPDX-License-Identifier: MIT

use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use treasury_withdraw::app::config::GlobalSettings;
use treasury_withdraw::app::logging::setup_logging;
use treasury_withdraw::app::server::{serve, AppState};
use treasury_withdraw::domain::error::AppError;
use treasury_withdraw::infrastructure::data::accounting::AccountingStore;
use treasury_withdraw::infrastructure::network::gateway::RpcGateway;
use treasury_withdraw::infrastructure::network::provider::ConnectionFactory;
use treasury_withdraw::services::pricing::StaticPriceOracle;
use treasury_withdraw::services::withdrawal::dispatch::WithdrawalEngine;

#[derive(Parser, Debug)]
#[command(author, version, about = "treasury withdrawal service")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Bind address (overrides config/env)
    #[arg(long)]
    bind: Option<String>,

    /// Emit JSON-formatted logs
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    // Missing or invalid custodial key is fatal by design.
    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    setup_logging(if settings.debug { "debug" } else { "info" }, cli.json_logs);

    let signer = PrivateKeySigner::from_str(&settings.wallet_key)
        .map_err(|e| AppError::Config(format!("Invalid wallet key: {}", e)))?;
    tracing::info!(
        target: "config",
        wallet = %format!("{:#x}", signer.address()),
        chain_id = settings.chain_id,
        "Custodial signer loaded"
    );

    let primary = ConnectionFactory::http(&settings.http_provider)?;
    let secondary = match settings.secondary_http_provider.as_deref() {
        Some(url) => Some(ConnectionFactory::http(url)?),
        None => {
            tracing::warn!(
                target: "config",
                "No secondary RPC configured; check-before withdrawals will be refused"
            );
            None
        }
    };

    let gateway = Arc::new(RpcGateway::new(
        primary,
        secondary,
        signer,
        settings.chain_id,
        Duration::from_millis(settings.receipt_poll_ms),
        Duration::from_millis(settings.receipt_timeout_ms),
    ));

    let accounting =
        AccountingStore::new(&settings.database_url(), settings.opening_earnings_fiat).await?;

    let engine = WithdrawalEngine::new(
        gateway.clone(),
        Arc::new(StaticPriceOracle::default()),
        accounting.clone(),
        settings.default_payout_address,
        settings.approval_token.clone(),
    );

    let state = Arc::new(AppState {
        engine,
        gateway,
        accounting,
    });

    let bind = cli.bind.unwrap_or_else(|| settings.bind.clone());
    let result = serve(state.clone(), &bind).await;
    state.accounting.close().await;
    result
}
