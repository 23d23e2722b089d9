// SPDX-License-Identifier: MIT

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

use crate::domain::error::AppError;
use crate::domain::types::AccountingSnapshot;

/// Durable accounting counters plus a journal of every submitted
/// withdrawal. Mutated only after a strategy reports success, except the
/// journal, which also records reverted and unconfirmed submissions.
#[derive(Clone)]
pub struct AccountingStore {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub tx_hash: String,
    pub strategy: String,
    pub destination: String,
    pub amount_eth: f64,
    pub status: String,
    pub created_at: String,
}

impl AccountingStore {
    pub async fn new(database_url: &str, opening_earnings_fiat: f64) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Initialization(format!("DB connect failed: {}", e)))?
            .create_if_missing(true);

        // Single connection: writes are serialized anyway, and a larger
        // pool would hand every `sqlite::memory:` connection its own
        // empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Initialization(format!("DB connect failed: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Initialization(format!("DB migration failed: {}", e)))?;

        sqlx::query(
            "INSERT INTO accounting (id, total_earnings_fiat, total_withdrawn_fiat)
             VALUES (1, ?, 0)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(opening_earnings_fiat)
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Atomic settlement of a successful withdrawal of fiat value `v`:
    /// withdrawn += v, earnings -= v floored at zero. One statement, so
    /// concurrent settlements cannot interleave.
    pub async fn apply_withdrawal(&self, fiat_value: f64) -> Result<AccountingSnapshot, AppError> {
        let row = sqlx::query(
            "UPDATE accounting
             SET total_withdrawn_fiat = total_withdrawn_fiat + ?1,
                 total_earnings_fiat = MAX(total_earnings_fiat - ?1, 0)
             WHERE id = 1
             RETURNING total_earnings_fiat, total_withdrawn_fiat",
        )
        .bind(fiat_value)
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountingSnapshot {
            total_earnings_fiat: row.get(0),
            total_withdrawn_fiat: row.get(1),
        })
    }

    pub async fn snapshot(&self) -> Result<AccountingSnapshot, AppError> {
        let row = sqlx::query(
            "SELECT total_earnings_fiat, total_withdrawn_fiat FROM accounting WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountingSnapshot {
            total_earnings_fiat: row.get(0),
            total_withdrawn_fiat: row.get(1),
        })
    }

    pub async fn record_submission(
        &self,
        tx_hash: &str,
        strategy: &str,
        destination: &str,
        amount_eth: f64,
        status: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO withdrawals (tx_hash, strategy, destination, amount_eth, status)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (tx_hash) DO UPDATE SET status = excluded.status",
        )
        .bind(tx_hash)
        .bind(strategy)
        .bind(destination)
        .bind(amount_eth)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<JournalEntry>, AppError> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            "SELECT tx_hash, strategy, destination, amount_eth, status, created_at
             FROM withdrawals ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Closes the pool on shutdown. Every call afterwards fails with a
    /// database error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
