//! Fire-and-forget notifications
//!
//! The orchestrator reports completed runs, executed trades and the end of a
//! full cycle to a [`Notifier`]. Delivery failures are logged by the caller
//! and never affect the cycle.

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::info;

use crate::db::{Run, Transaction};
use crate::engine::CycleOutcome;

pub trait Notifier {
    fn run_completed(&self, owner: &str, run: &Run) -> Result<()>;

    fn trade_executed(&self, txn: &Transaction) -> Result<()>;

    /// End of `run_all` for one owner. Only called when at least one trade executed.
    fn cycle_summary(&self, _owner: &str, _outcomes: &[CycleOutcome]) -> Result<()> {
        Ok(())
    }
}

/// Writes every notification as a structured log event
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn run_completed(&self, owner: &str, run: &Run) -> Result<()> {
        info!(
            owner,
            strategy = %run.strategy,
            run_id = %run.id,
            trades = run.executed_trades.len(),
            value_before = %run.value_before,
            value_after = %run.value_after,
            "run completed"
        );
        Ok(())
    }

    fn trade_executed(&self, txn: &Transaction) -> Result<()> {
        info!(
            owner = %txn.owner,
            strategy = %txn.strategy,
            action = txn.transaction_type.as_str(),
            symbol = %txn.symbol,
            shares = %txn.shares,
            price = %txn.price,
            "trade executed"
        );
        Ok(())
    }

    fn cycle_summary(&self, owner: &str, outcomes: &[CycleOutcome]) -> Result<()> {
        let trades: usize = outcomes.iter().map(CycleOutcome::trades).sum();
        let change: Decimal = outcomes.iter().map(CycleOutcome::value_change).sum();
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        info!(owner, trades, value_change = %change, failed, "daily summary");
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn run_completed(&self, _owner: &str, _run: &Run) -> Result<()> {
        Ok(())
    }

    fn trade_executed(&self, _txn: &Transaction) -> Result<()> {
        Ok(())
    }
}
