//! Sqlite-backed quota store.

use crate::services::quota::QuotaStore;
use async_trait::async_trait;
use chrono::Utc;
use review_core::{ReviewError, Result};
use sqlx::{Row, SqlitePool};

pub struct SqliteQuotaStore {
    pool: SqlitePool,
}

impl SqliteQuotaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_err(err: sqlx::Error) -> ReviewError {
    ReviewError::Internal(format!("quota storage error: {err}"))
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn balance(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT balance FROM quota_balances WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get::<i64, _>("balance")).unwrap_or(0))
    }

    async fn deduct(&self, user_id: &str, task_id: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Debit exactly one credit iff balance is positive.
        let result = sqlx::query(
            "UPDATE quota_balances SET balance = balance - 1
             WHERE user_id = ? AND balance > 0",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(ReviewError::Validation(format!(
                "user {user_id} has no credits to deduct"
            )));
        }

        sqlx::query(
            "INSERT INTO quota_ledger (user_id, task_id, amount, recorded_at)
             VALUES (?, ?, -1, ?)",
        )
        .bind(user_id)
        .bind(task_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let row = sqlx::query("SELECT balance FROM quota_balances WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(row.get::<i64, _>("balance"))
    }

    async fn add_credits(&self, user_id: &str, amount: i64) -> Result<i64> {
        sqlx::query(
            "INSERT INTO quota_balances (user_id, balance) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        self.balance(user_id).await
    }
}
