use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{Portfolio, Position, StrategyKind};

/// Summary of a single position
#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub shares: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub gain_loss: Decimal,
    /// Unrealized return in percent (12.5 = +12.5%)
    pub gain_loss_pct: Decimal,
    /// Share of total portfolio value in percent
    pub weight_pct: Decimal,
}

/// Point-in-time view of one strategy's portfolio
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub owner: String,
    pub strategy: StrategyKind,
    pub total_value: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub total_cost: Decimal,
    pub total_gain_loss: Decimal,
    pub num_positions: usize,
    pub positions: Vec<PositionSummary>,
}

impl PositionSummary {
    fn new(position: &Position, total_value: Decimal) -> Self {
        let market_value = position.market_value();
        let weight_pct = if total_value > Decimal::ZERO {
            (market_value / total_value * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            symbol: position.symbol.clone(),
            shares: position.shares,
            avg_cost: position.avg_cost,
            current_price: position.current_price,
            market_value,
            gain_loss: position.gain_loss(),
            gain_loss_pct: (position.gain_loss_pct() * Decimal::ONE_HUNDRED).round_dp(2),
            weight_pct,
        }
    }
}

impl PortfolioSummary {
    /// Summarize using the prices already on the positions. Largest holding first.
    pub fn from_portfolio(portfolio: &Portfolio) -> Self {
        let total_value = portfolio.total_value();

        let mut positions: Vec<PositionSummary> = portfolio
            .positions
            .values()
            .map(|p| PositionSummary::new(p, total_value))
            .collect();
        positions.sort_by(|a, b| b.market_value.cmp(&a.market_value).then(a.symbol.cmp(&b.symbol)));

        let total_cost = portfolio
            .positions
            .values()
            .map(|p| p.shares * p.avg_cost)
            .sum();
        let total_gain_loss = positions.iter().map(|p| p.gain_loss).sum();

        Self {
            owner: portfolio.owner.clone(),
            strategy: portfolio.strategy,
            total_value,
            cash: portfolio.cash,
            positions_value: portfolio.positions_value(),
            total_cost,
            total_gain_loss,
            num_positions: portfolio.num_positions(),
            positions,
        }
    }
}
