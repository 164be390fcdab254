//! In-memory repository
//!
//! Keeps everything in process memory. Used for offline simulations and as
//! the test double for the orchestrator; it can also be told to fail writes
//! so persistence-failure handling can be exercised.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::models::{Portfolio, Run, StrategyKind, Transaction};
use super::Repository;
use crate::error::CouncilError;

#[derive(Default)]
struct Store {
    portfolios: HashMap<(String, StrategyKind), Portfolio>,
    transactions: Vec<Transaction>,
    runs: Vec<Run>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    fail_writes: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a repository error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn run_count(&self) -> usize {
        self.lock().runs.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self, what: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CouncilError::Repository(format!("write rejected: {}", what)).into());
        }
        Ok(())
    }
}

impl Repository for InMemoryRepository {
    fn get_portfolio(&self, owner: &str, strategy: StrategyKind) -> Result<Option<Portfolio>> {
        Ok(self
            .lock()
            .portfolios
            .get(&(owner.to_string(), strategy))
            .cloned())
    }

    fn put_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        self.check_writable("portfolio")?;
        self.lock().portfolios.insert(
            (portfolio.owner.clone(), portfolio.strategy),
            portfolio.clone(),
        );
        Ok(())
    }

    fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>> {
        let mut portfolios: Vec<Portfolio> = self
            .lock()
            .portfolios
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect();
        portfolios.sort_by_key(|p| p.strategy);
        Ok(portfolios)
    }

    fn put_transaction(&self, txn: &Transaction) -> Result<()> {
        self.check_writable("transaction")?;
        self.lock().transactions.push(txn.clone());
        Ok(())
    }

    fn get_transactions(&self, owner: &str, limit: usize) -> Result<Vec<Transaction>> {
        Ok(self
            .lock()
            .transactions
            .iter()
            .rev()
            .filter(|t| t.owner == owner)
            .take(limit)
            .cloned()
            .collect())
    }

    fn put_run(&self, run: &Run) -> Result<()> {
        self.check_writable("run")?;
        self.lock().runs.push(run.clone());
        Ok(())
    }

    fn get_runs(&self, strategy: StrategyKind, limit: usize) -> Result<Vec<Run>> {
        Ok(self
            .lock()
            .runs
            .iter()
            .rev()
            .filter(|r| r.strategy == strategy)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_one_portfolio_per_owner_and_strategy() {
        let repo = InMemoryRepository::new();
        let mut portfolio = Portfolio::new("alice", StrategyKind::Passive, dec!(100));
        repo.put_portfolio(&portfolio).unwrap();
        portfolio.cash = dec!(50);
        repo.put_portfolio(&portfolio).unwrap();

        let all = repo.list_portfolios("alice").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].cash, dec!(50));
    }

    #[test]
    fn test_fail_writes_rejects_with_repository_error() {
        let repo = InMemoryRepository::new();
        repo.set_fail_writes(true);
        let portfolio = Portfolio::new("alice", StrategyKind::Passive, dec!(100));

        let err = repo.put_portfolio(&portfolio).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CouncilError>(),
            Some(CouncilError::Repository(_))
        ));
        assert!(repo.get_portfolio("alice", StrategyKind::Passive).unwrap().is_none());
    }
}
