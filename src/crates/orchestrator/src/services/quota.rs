//! Per-user review quota.
//!
//! Check-before-start, deduct-after-success: the gate is consulted before
//! a graph run begins, and exactly one credit is debited when a review
//! completes. Deduction failures after a successful review are logged and
//! never reverse the review status.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use review_core::{ReviewError, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// One ledger entry per deduction.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub user_id: String,
    pub task_id: String,
    pub amount: i64,
    pub recorded_at: chrono::DateTime<Utc>,
}

/// Storage interface for balances and the ledger.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn balance(&self, user_id: &str) -> Result<i64>;

    /// Atomically debit one credit and append a ledger entry. Fails when
    /// the balance is already zero.
    async fn deduct(&self, user_id: &str, task_id: &str) -> Result<i64>;

    /// Credit a user; used by provisioning.
    async fn add_credits(&self, user_id: &str, amount: i64) -> Result<i64>;
}

/// In-memory store for tests and billing-disabled deployments.
#[derive(Default)]
pub struct MemoryQuotaStore {
    inner: Mutex<MemoryQuotaInner>,
}

#[derive(Default)]
struct MemoryQuotaInner {
    balances: HashMap<String, i64>,
    ledger: Vec<LedgerEntry>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.inner.lock().ledger.clone()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn balance(&self, user_id: &str) -> Result<i64> {
        Ok(*self.inner.lock().balances.get(user_id).unwrap_or(&0))
    }

    async fn deduct(&self, user_id: &str, task_id: &str) -> Result<i64> {
        let mut inner = self.inner.lock();
        let balance = inner.balances.entry(user_id.to_string()).or_insert(0);
        if *balance <= 0 {
            return Err(ReviewError::Validation(format!(
                "user {user_id} has no credits to deduct"
            )));
        }
        *balance -= 1;
        let remaining = *balance;
        inner.ledger.push(LedgerEntry {
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            amount: -1,
            recorded_at: Utc::now(),
        });
        Ok(remaining)
    }

    async fn add_credits(&self, user_id: &str, amount: i64) -> Result<i64> {
        let mut inner = self.inner.lock();
        let balance = inner.balances.entry(user_id.to_string()).or_insert(0);
        *balance += amount;
        Ok(*balance)
    }
}

/// The quota gate used by the API and the runner.
pub struct QuotaService {
    store: std::sync::Arc<dyn QuotaStore>,
    enabled: bool,
}

impl QuotaService {
    pub fn new(store: std::sync::Arc<dyn QuotaStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Fails when billing is on and the user has no balance left.
    pub async fn check(&self, user_id: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let balance = self.store.balance(user_id).await?;
        if balance <= 0 {
            return Err(ReviewError::QuotaExhausted(user_id.to_string()));
        }
        Ok(())
    }

    /// Debit one credit after a completed review. Never fails the caller.
    pub async fn deduct_for_completed(&self, user_id: &str, task_id: &str) {
        if !self.enabled {
            return;
        }
        match self.store.deduct(user_id, task_id).await {
            Ok(remaining) => {
                info!(user_id, task_id, remaining, "review credit deducted");
            }
            Err(err) => {
                // The review stays completed; bookkeeping catches up later.
                warn!(user_id, task_id, %err, "quota deduction failed after completion");
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn balance(&self, user_id: &str) -> Result<i64> {
        self.store.balance(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn check_fails_on_empty_balance() {
        let store = Arc::new(MemoryQuotaStore::new());
        let service = QuotaService::new(store.clone(), true);
        assert!(service.check("u1").await.is_err());

        store.add_credits("u1", 2).await.unwrap();
        assert!(service.check("u1").await.is_ok());
    }

    #[tokio::test]
    async fn deduct_debits_exactly_one_and_records_ledger() {
        let store = Arc::new(MemoryQuotaStore::new());
        store.add_credits("u1", 2).await.unwrap();
        let service = QuotaService::new(store.clone(), true);

        service.deduct_for_completed("u1", "t1").await;
        assert_eq!(store.balance("u1").await.unwrap(), 1);
        let ledger = store.ledger();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].task_id, "t1");
        assert_eq!(ledger[0].amount, -1);
    }

    #[tokio::test]
    async fn deduction_failure_does_not_propagate() {
        let store = Arc::new(MemoryQuotaStore::new());
        let service = QuotaService::new(store.clone(), true);
        // No credits: deduct fails internally but the call returns.
        service.deduct_for_completed("u1", "t1").await;
        assert_eq!(store.balance("u1").await.unwrap(), 0);
        assert!(store.ledger().is_empty());
    }

    #[tokio::test]
    async fn disabled_billing_never_gates() {
        let store = Arc::new(MemoryQuotaStore::new());
        let service = QuotaService::new(store.clone(), false);
        assert!(service.check("u1").await.is_ok());
        service.deduct_for_completed("u1", "t1").await;
        assert!(store.ledger().is_empty());
    }
}
