// SPDX-License-Identifier: MIT

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::common::units::wei_to_eth;
use crate::domain::error::AppError;
use crate::domain::types::{WithdrawFailure, WithdrawRequest};
use crate::infrastructure::data::accounting::AccountingStore;
use crate::infrastructure::network::gateway::ChainGateway;
use crate::services::withdrawal::dispatch::{StrategyKind, WithdrawalEngine};

const APPROVAL_HEADER: &str = "x-approval-token";
const JOURNAL_TAIL: i64 = 20;

pub struct AppState<G> {
    pub engine: WithdrawalEngine<G>,
    pub gateway: Arc<G>,
    pub accounting: AccountingStore,
}

#[derive(Debug, Serialize)]
struct ApiResponse {
    success: bool,
    message: String,
    data: serde_json::Value,
    #[serde(rename = "totalEarnings", skip_serializing_if = "Option::is_none")]
    total_earnings: Option<f64>,
}

impl ApiResponse {
    fn ok(message: String, data: serde_json::Value, total_earnings: f64) -> Self {
        Self {
            success: true,
            message,
            data,
            total_earnings: Some(total_earnings),
        }
    }

    fn failure(message: String, data: serde_json::Value) -> Self {
        Self {
            success: false,
            message,
            data,
            total_earnings: None,
        }
    }
}

pub fn router<G: ChainGateway + 'static>(state: Arc<AppState<G>>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/status", get(status::<G>))
        .route("/withdraw/{strategy}", post(withdraw::<G>))
        .fallback(not_found)
        .with_state(state)
}

pub async fn serve<G: ChainGateway + 'static>(
    state: Arc<AppState<G>>,
    bind: &str,
) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::Initialization(format!("Bind {} failed: {}", bind, e)))?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(target: "http", %addr, "Withdrawal service listening");
    }
    axum::serve(listener, router(state))
        .await
        .map_err(|e| AppError::Initialization(format!("HTTP server failed: {}", e)))
}

async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "treasury-withdraw" }))
}

async fn status<G: ChainGateway + 'static>(
    State(state): State<Arc<AppState<G>>>,
) -> (StatusCode, Json<ApiResponse>) {
    let balance = match state.gateway.balance().await {
        Ok(b) => b,
        Err(e) => return failure_response(&WithdrawFailure::from(e)),
    };
    let snapshot = match state.accounting.snapshot().await {
        Ok(s) => s,
        Err(e) => return failure_response(&WithdrawFailure::from(e)),
    };
    let recent = state
        .accounting
        .recent(JOURNAL_TAIL)
        .await
        .unwrap_or_default();

    let body = ApiResponse::ok(
        "status".to_string(),
        json!({
            "balanceEth": wei_to_eth(balance),
            "accounting": snapshot,
            "strategies": state.engine.strategies(),
            "recentWithdrawals": recent,
        }),
        snapshot.total_earnings_fiat,
    );
    (StatusCode::OK, Json(body))
}

async fn withdraw<G: ChainGateway + 'static>(
    State(state): State<Arc<AppState<G>>>,
    Path(strategy): Path<String>,
    headers: HeaderMap,
    Json(req): Json<WithdrawRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let kind = match StrategyKind::from_str(&strategy) {
        Ok(kind) => kind,
        Err(e) => return failure_response(&WithdrawFailure::from(e)),
    };

    let approval = headers
        .get(APPROVAL_HEADER)
        .and_then(|v| v.to_str().ok());

    tracing::info!(
        target: "http",
        strategy = kind.as_str(),
        destination = %req.destination,
        amount_eth = req.amount_eth,
        "Withdrawal requested"
    );

    match state.engine.dispatch(kind, &req, approval).await {
        Ok(receipt) => {
            let total_earnings = state
                .accounting
                .snapshot()
                .await
                .map(|s| s.total_earnings_fiat)
                .unwrap_or_default();
            let message = receipt.message.clone();
            let body = ApiResponse::ok(message, json!(receipt), total_earnings);
            (StatusCode::OK, Json(body))
        }
        Err(failure) => failure_response(&failure),
    }
}

async fn not_found() -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure(
            "not found".to_string(),
            serde_json::Value::Null,
        )),
    )
}

fn failure_response(failure: &WithdrawFailure) -> (StatusCode, Json<ApiResponse>) {
    let mut data = json!({ "code": failure.error.code() });
    if let Some(hash) = failure.error.tx_hash() {
        data["txHash"] = json!(hash);
    }
    if !failure.legs.is_empty() {
        data["legs"] = json!(failure.legs);
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::failure(failure.error.to_string(), data)),
    )
}
