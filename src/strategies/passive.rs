//! Passive allocator
//!
//! Two index funds held at a fixed stock/bond split. New cash is deployed in
//! the first days of each month; otherwise the only activity is a rebalance
//! when the stock weight drifts past the threshold.

use anyhow::Result;
use chrono::Datelike;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::sizing::shares_for;
use super::{fixed, pct, CycleContext, Strategy};
use crate::db::{Portfolio, Recommendation, StrategyKind};
use crate::error::CouncilError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveConfig {
    /// Total stock market fund
    pub stock_symbol: String,
    /// Total bond market fund
    pub bond_symbol: String,
    pub target_stock_pct: Decimal,
    pub rebalance_threshold: Decimal,
    /// Cash must exceed this before a deployment happens
    pub min_deploy_cash: Decimal,
    /// Deploy cash only on days 1..=N of the month
    pub deploy_window_days: u32,
}

impl Default for PassiveConfig {
    fn default() -> Self {
        Self {
            stock_symbol: "VTI".to_string(),
            bond_symbol: "BND".to_string(),
            target_stock_pct: dec!(0.70),
            rebalance_threshold: dec!(0.05),
            min_deploy_cash: dec!(1000),
            deploy_window_days: 5,
        }
    }
}

impl PassiveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_stock_pct < Decimal::ZERO || self.target_stock_pct > Decimal::ONE {
            return Err(CouncilError::Config(format!(
                "passive.target_stock_pct must be within [0, 1], got {}",
                self.target_stock_pct
            ))
            .into());
        }
        Ok(())
    }

    fn target_bond_pct(&self) -> Decimal {
        Decimal::ONE - self.target_stock_pct
    }
}

const DEPLOY_CONFIDENCE: Decimal = dec!(0.95);
const REBALANCE_CONFIDENCE: Decimal = dec!(0.85);

pub struct PassiveStrategy {
    config: PassiveConfig,
}

impl PassiveStrategy {
    pub fn new(config: PassiveConfig) -> Self {
        Self { config }
    }

    fn is_deploy_day(&self, ctx: &CycleContext) -> bool {
        ctx.today.day() <= self.config.deploy_window_days
    }

    /// Split `cash` by target weights and buy whole shares of each fund
    fn allocate_cash(&self, cash: Decimal, ctx: &CycleContext) -> Vec<Recommendation> {
        let legs = [
            (
                &self.config.stock_symbol,
                cash * self.config.target_stock_pct,
                "Monthly allocation to total market index",
            ),
            (
                &self.config.bond_symbol,
                cash * self.config.target_bond_pct(),
                "Monthly allocation to total bond index",
            ),
        ];

        legs.into_iter()
            .filter_map(|(symbol, amount, reasoning)| {
                let data = ctx.market.get(symbol)?;
                let shares = shares_for(amount, data.price);
                (shares > Decimal::ZERO)
                    .then(|| Recommendation::buy(symbol, shares, reasoning, DEPLOY_CONFIDENCE))
            })
            .collect()
    }

    fn rebalance(
        &self,
        portfolio: &Portfolio,
        current_stock_pct: Decimal,
        ctx: &CycleContext,
    ) -> Option<Recommendation> {
        let symbol = &self.config.stock_symbol;
        let target = self.config.target_stock_pct;
        let data = ctx.market.get(symbol)?;

        let held = portfolio.position(symbol);
        let current_stock_value = held.map(|p| p.market_value()).unwrap_or_default();
        let target_stock_value = portfolio.total_value() * target;

        if current_stock_pct > target {
            let excess = current_stock_value - target_stock_value;
            let held_shares = held.map(|p| p.shares).unwrap_or_default();
            let shares = shares_for(excess, data.price).min(held_shares);
            (shares > Decimal::ZERO).then(|| {
                Recommendation::sell(
                    symbol,
                    shares,
                    format!(
                        "Rebalance - stocks over target ({} vs {})",
                        pct(current_stock_pct),
                        pct(target)
                    ),
                    REBALANCE_CONFIDENCE,
                )
            })
        } else {
            let deficit = target_stock_value - current_stock_value;
            if portfolio.cash < deficit {
                return None;
            }
            let shares = shares_for(deficit, data.price);
            (shares > Decimal::ZERO).then(|| {
                Recommendation::buy(
                    symbol,
                    shares,
                    format!(
                        "Rebalance - stocks under target ({} vs {})",
                        pct(current_stock_pct),
                        pct(target)
                    ),
                    REBALANCE_CONFIDENCE,
                )
            })
        }
    }
}

impl Strategy for PassiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Passive
    }

    fn analyze(&self, ctx: &CycleContext) -> String {
        let action = if self.is_deploy_day(ctx) {
            "Monthly investment day - deploying new capital"
        } else {
            "Stay the course"
        };

        format!(
            "Date: {}\n\
             Philosophy: Time in the market beats timing the market.\n\
             Action: {}\n\
             Target Allocation: {}% stocks / {}% bonds\n\
             Wisdom: 'The stock market is a giant distraction to the business of investing.'",
            ctx.today,
            action,
            fixed(self.config.target_stock_pct * Decimal::ONE_HUNDRED, 0),
            fixed(self.config.target_bond_pct() * Decimal::ONE_HUNDRED, 0),
        )
    }

    fn recommend(&self, portfolio: &Portfolio, ctx: &CycleContext) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        let value_of = |symbol: &str| {
            portfolio
                .position(symbol)
                .map(|p| p.market_value())
                .unwrap_or_default()
        };
        let stock_value = value_of(&self.config.stock_symbol);
        let bond_value = value_of(&self.config.bond_symbol);
        let total_invested = stock_value + bond_value;

        if portfolio.cash > self.config.min_deploy_cash && self.is_deploy_day(ctx) {
            recommendations.extend(self.allocate_cash(portfolio.cash, ctx));
        }

        if total_invested > Decimal::ZERO {
            let current_stock_pct = stock_value / total_invested;
            let deviation = (current_stock_pct - self.config.target_stock_pct).abs();
            if deviation > self.config.rebalance_threshold {
                recommendations.extend(self.rebalance(portfolio, current_stock_pct, ctx));
            }
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionType;
    use crate::strategies::test_support::{market, portfolio, snapshot};
    use crate::pricing::Fundamentals;
    use chrono::NaiveDate;

    fn funds() -> Vec<Fundamentals> {
        vec![
            snapshot("VTI", dec!(250), |_| {}),
            snapshot("BND", dec!(72), |_| {}),
        ]
    }

    fn on(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_deploys_cash_at_target_split() {
        let market = market(funds());
        let ctx = CycleContext::new(&market, on(3));
        let strategy = PassiveStrategy::new(PassiveConfig::default());

        let recs = strategy.recommend(&portfolio(dec!(100000), &[]), &ctx);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].symbol, "VTI");
        assert_eq!(recs[0].shares, dec!(280));
        assert_eq!(recs[1].symbol, "BND");
        assert_eq!(recs[1].shares, dec!(416));
        assert!(recs.iter().all(|r| r.action == TransactionType::Buy));
        assert!(recs.iter().all(|r| r.confidence == dec!(0.95)));

        // Dollar split of the new shares matches 70/30 within one share of each fund
        let stock = recs[0].shares * dec!(250);
        let bond = recs[1].shares * dec!(72);
        let ratio = stock / (stock + bond);
        assert!((ratio - dec!(0.70)).abs() < dec!(0.005), "ratio was {}", ratio);
    }

    #[test]
    fn test_no_deployment_outside_window_or_below_minimum() {
        let market = market(funds());
        let strategy = PassiveStrategy::new(PassiveConfig::default());

        let late = CycleContext::new(&market, on(6));
        assert!(strategy.recommend(&portfolio(dec!(100000), &[]), &late).is_empty());

        let early = CycleContext::new(&market, on(1));
        assert!(strategy.recommend(&portfolio(dec!(1000), &[]), &early).is_empty());
    }

    #[test]
    fn test_rebalance_sells_overweight_stocks() {
        let market = market(funds());
        let ctx = CycleContext::new(&market, on(20));
        let strategy = PassiveStrategy::new(PassiveConfig::default());

        // 90% stocks among holdings; total value 100k, target stock value 70k
        let p = portfolio(
            dec!(0),
            &[
                ("VTI", dec!(360), dec!(200), dec!(250)),
                ("BND", dec!(138.888), dec!(72), dec!(72)),
            ],
        );
        let recs = strategy.recommend(&p, &ctx);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].action, TransactionType::Sell);
        // excess = 90000 - 0.7 * 99999.936 = 20000.0448 -> 80 shares
        assert_eq!(recs[0].shares, dec!(80));
        assert!(recs[0].reasoning.contains("over target"));
    }

    #[test]
    fn test_rebalance_buy_requires_cash_for_deficit() {
        let market = market(funds());
        let ctx = CycleContext::new(&market, on(20));
        let strategy = PassiveStrategy::new(PassiveConfig::default());

        // 50/50 split, no cash: deficit exists but cannot be funded
        let p = portfolio(
            dec!(0),
            &[
                ("VTI", dec!(100), dec!(250), dec!(250)),
                ("BND", dec!(347.2222), dec!(72), dec!(72)),
            ],
        );
        assert!(strategy.recommend(&p, &ctx).is_empty());

        // Same holdings with enough cash: buy the deficit
        let mut funded = p.clone();
        funded.cash = dec!(40000);
        let recs = strategy.recommend(&funded, &ctx);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].action, TransactionType::Buy);
        assert!(recs[0].reasoning.contains("under target"));
    }

    #[test]
    fn test_analysis_mentions_split() {
        let market = market(vec![]);
        let strategy = PassiveStrategy::new(PassiveConfig::default());
        let text = strategy.analyze(&CycleContext::new(&market, on(2)));
        assert!(text.contains("70% stocks / 30% bonds"));
        assert!(text.contains("deploying new capital"));
    }
}
