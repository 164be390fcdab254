//! Trade execution against a portfolio
//!
//! Every fill happens immediately at the provider's current price. Buys that
//! cost more than the available cash are shrunk to what the cash covers;
//! sells are capped at the shares held.

use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{Portfolio, Position, Recommendation, Repository, Transaction, TransactionType};
use crate::pricing::FundamentalsProvider;
use crate::strategies::sizing::shares_for;

/// Why a recommendation was not executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    PriceUnavailable,
    InsufficientCash,
    NoPosition,
    InvalidQuantity,
    NotExecutable,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeclineReason::PriceUnavailable => "price unavailable",
            DeclineReason::InsufficientCash => "insufficient cash",
            DeclineReason::NoPosition => "no position to sell",
            DeclineReason::InvalidQuantity => "share count must be positive",
            DeclineReason::NotExecutable => "action cannot be executed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Filled(Transaction),
    Declined(DeclineReason),
}

impl Execution {
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Execution::Filled(txn) => Some(txn),
            Execution::Declined(_) => None,
        }
    }
}

/// A fill that has been priced and sized but not yet applied
struct Fill {
    action: TransactionType,
    shares: Decimal,
    price: Decimal,
}

pub struct ExecutionEngine<'a> {
    market: &'a dyn FundamentalsProvider,
    repo: &'a dyn Repository,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(market: &'a dyn FundamentalsProvider, repo: &'a dyn Repository) -> Self {
        Self { market, repo }
    }

    /// Apply one recommendation to `portfolio`.
    ///
    /// On a fill the transaction is persisted first and the portfolio is
    /// mutated only once that succeeds, so a repository error leaves the
    /// portfolio as it was. Declines have no side effects.
    pub fn execute(&self, portfolio: &mut Portfolio, rec: &Recommendation) -> Result<Execution> {
        let fill = match self.price_fill(portfolio, rec) {
            Ok(fill) => fill,
            Err(reason) => {
                warn!(
                    "Declined {} {} {} for {}: {}",
                    rec.action.as_str(),
                    rec.shares,
                    rec.symbol,
                    portfolio.strategy,
                    reason
                );
                return Ok(Execution::Declined(reason));
            }
        };

        let txn = Transaction {
            id: Uuid::new_v4().to_string(),
            portfolio_id: portfolio.id.clone(),
            owner: portfolio.owner.clone(),
            strategy: portfolio.strategy,
            transaction_type: fill.action,
            symbol: rec.symbol.clone(),
            shares: fill.shares,
            price: fill.price,
            reasoning: rec.reasoning.clone(),
            created_at: Utc::now(),
        };
        self.repo.put_transaction(&txn)?;

        apply_fill(portfolio, &rec.symbol, &fill);
        portfolio.updated_at = txn.created_at;

        debug!(
            "Executed {} {} {} @ {} (cash now {})",
            fill.action.as_str(),
            fill.shares,
            rec.symbol,
            fill.price,
            portfolio.cash
        );
        Ok(Execution::Filled(txn))
    }

    /// Decide the realized shares and price without touching anything
    fn price_fill(&self, portfolio: &Portfolio, rec: &Recommendation) -> Result<Fill, DeclineReason> {
        if rec.action == TransactionType::Dividend {
            return Err(DeclineReason::NotExecutable);
        }
        if rec.shares <= Decimal::ZERO {
            return Err(DeclineReason::InvalidQuantity);
        }

        let price = self
            .market
            .get(&rec.symbol)
            .map(|data| data.price)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or(DeclineReason::PriceUnavailable)?;

        match rec.action {
            TransactionType::Buy => {
                let mut shares = rec.shares;
                if price * shares > portfolio.cash {
                    shares = shares_for(portfolio.cash, price);
                    if shares <= Decimal::ZERO {
                        return Err(DeclineReason::InsufficientCash);
                    }
                    debug!("Clamped buy of {} from {} to {} shares", rec.symbol, rec.shares, shares);
                }
                Ok(Fill {
                    action: TransactionType::Buy,
                    shares,
                    price,
                })
            }
            TransactionType::Sell => {
                let held = portfolio
                    .position(&rec.symbol)
                    .ok_or(DeclineReason::NoPosition)?;
                Ok(Fill {
                    action: TransactionType::Sell,
                    shares: rec.shares.min(held.shares),
                    price,
                })
            }
            TransactionType::Dividend => Err(DeclineReason::NotExecutable),
        }
    }
}

fn apply_fill(portfolio: &mut Portfolio, symbol: &str, fill: &Fill) {
    let amount = fill.shares * fill.price;

    match fill.action {
        TransactionType::Buy => {
            portfolio.cash -= amount;
            match portfolio.positions.get_mut(symbol) {
                Some(pos) => {
                    let total_shares = pos.shares + fill.shares;
                    pos.avg_cost = (pos.shares * pos.avg_cost + amount) / total_shares;
                    pos.shares = total_shares;
                    pos.current_price = fill.price;
                }
                None => {
                    portfolio
                        .positions
                        .insert(symbol.to_string(), Position::new(symbol, fill.shares, fill.price));
                }
            }
        }
        TransactionType::Sell => {
            portfolio.cash += amount;
            let emptied = match portfolio.positions.get_mut(symbol) {
                Some(pos) => {
                    pos.shares -= fill.shares;
                    pos.current_price = fill.price;
                    pos.shares <= Decimal::ZERO
                }
                None => false,
            };
            if emptied {
                portfolio.positions.remove(symbol);
            }
        }
        TransactionType::Dividend => {}
    }
}
