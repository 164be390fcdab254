//! Macro risk-parity allocator
//!
//! Fixed target weights across stocks, long and intermediate treasuries,
//! gold and commodities. Any asset drifting more than the threshold from its
//! target is traded back to it, and idle cash is deployed pro-rata.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;

use super::sizing::shares_for;
use super::{fixed, pct, CycleContext, Strategy};
use crate::db::{Portfolio, Recommendation, StrategyKind};
use crate::error::CouncilError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTarget {
    pub symbol: String,
    pub weight: Decimal,
}

impl AssetTarget {
    pub fn new(symbol: &str, weight: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParityConfig {
    pub targets: Vec<AssetTarget>,
    pub rebalance_threshold: Decimal,
    /// Deploy when cash exceeds this share of total value
    pub idle_cash_pct: Decimal,
    /// Share of cash put to work on deployment
    pub deploy_pct: Decimal,
}

impl Default for RiskParityConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                AssetTarget::new("VTI", dec!(0.30)),
                AssetTarget::new("TLT", dec!(0.40)),
                AssetTarget::new("IEI", dec!(0.15)),
                AssetTarget::new("GLD", dec!(0.075)),
                AssetTarget::new("DBC", dec!(0.075)),
            ],
            rebalance_threshold: dec!(0.05),
            idle_cash_pct: dec!(0.10),
            deploy_pct: dec!(0.9),
        }
    }
}

impl RiskParityConfig {
    pub fn validate(&self) -> Result<()> {
        let total: Decimal = self.targets.iter().map(|t| t.weight).sum();
        if total != Decimal::ONE {
            return Err(CouncilError::Config(format!(
                "risk_parity target weights must sum to 1, got {}",
                total
            ))
            .into());
        }
        if let Some(t) = self.targets.iter().find(|t| t.weight < Decimal::ZERO) {
            return Err(CouncilError::Config(format!(
                "risk_parity weight for {} is negative",
                t.symbol
            ))
            .into());
        }
        Ok(())
    }
}

const REBALANCE_CONFIDENCE: Decimal = dec!(0.85);
const DEPLOY_CONFIDENCE: Decimal = dec!(0.9);

pub struct RiskParityStrategy {
    config: RiskParityConfig,
}

impl RiskParityStrategy {
    pub fn new(config: RiskParityConfig) -> Self {
        Self { config }
    }

    /// Market value share of total value for each held symbol
    fn current_weights(portfolio: &Portfolio) -> HashMap<&str, Decimal> {
        let total = portfolio.total_value();
        if total <= Decimal::ZERO {
            return HashMap::new();
        }
        portfolio
            .positions
            .values()
            .map(|p| (p.symbol.as_str(), p.market_value() / total))
            .collect()
    }

    fn rebalance(&self, portfolio: &Portfolio, ctx: &CycleContext) -> Vec<Recommendation> {
        let weights = Self::current_weights(portfolio);
        let total_value = portfolio.total_value();
        let mut recommendations = Vec::new();

        for target in &self.config.targets {
            let current = weights.get(target.symbol.as_str()).copied().unwrap_or_default();
            if (current - target.weight).abs() <= self.config.rebalance_threshold {
                continue;
            }
            let Some(data) = ctx.market.get(&target.symbol) else {
                continue;
            };

            let target_value = total_value * target.weight;
            let current_value = total_value * current;
            let reasoning = format!("Rebalance: {} -> {}", pct(current), pct(target.weight));

            if current < target.weight {
                let gap = target_value - current_value;
                let shares = shares_for(gap, data.price);
                if shares > Decimal::ZERO && gap <= portfolio.cash {
                    recommendations.push(Recommendation::buy(
                        &target.symbol,
                        shares,
                        reasoning,
                        REBALANCE_CONFIDENCE,
                    ));
                }
            } else {
                let gap = current_value - target_value;
                let shares = shares_for(gap, data.price);
                let covered = portfolio
                    .position(&target.symbol)
                    .is_some_and(|p| p.shares >= shares);
                if shares > Decimal::ZERO && covered {
                    recommendations.push(Recommendation::sell(
                        &target.symbol,
                        shares,
                        reasoning,
                        REBALANCE_CONFIDENCE,
                    ));
                }
            }
        }

        recommendations
    }

    fn deploy_cash(&self, portfolio: &Portfolio, ctx: &CycleContext) -> Vec<Recommendation> {
        let deployable = portfolio.cash * self.config.deploy_pct;

        self.config
            .targets
            .iter()
            .filter_map(|target| {
                let data = ctx.market.get(&target.symbol)?;
                let shares = shares_for(deployable * target.weight, data.price);
                (shares > Decimal::ZERO).then(|| {
                    Recommendation::buy(
                        &target.symbol,
                        shares,
                        format!("Initial allocation: {} of portfolio", pct(target.weight)),
                        DEPLOY_CONFIDENCE,
                    )
                })
            })
            .collect()
    }
}

impl Strategy for RiskParityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RiskParity
    }

    fn analyze(&self, ctx: &CycleContext) -> String {
        let mut analysis = format!(
            "Date: {}\n\
             Philosophy: Balance risk across economic environments.\n\n\
             Target Allocation:\n",
            ctx.today
        );
        for target in &self.config.targets {
            let _ = writeln!(analysis, "  - {}: {}", target.symbol, pct(target.weight));
        }
        let _ = write!(
            analysis,
            "\nRebalance threshold: {} drift\n\
             Environment Assessment: Balanced - maintaining all-weather allocation\n\n\
             Quadrant Analysis:\n\
             \x20 - Growth Rising + Inflation Rising: Commodities, TIPS\n\
             \x20 - Growth Rising + Inflation Falling: Stocks\n\
             \x20 - Growth Falling + Inflation Rising: Gold\n\
             \x20 - Growth Falling + Inflation Falling: Bonds\n\n\
             Wisdom: 'Diversifying well is the most important thing you need to do in order to invest well.'",
            fixed(self.config.rebalance_threshold * Decimal::ONE_HUNDRED, 0) + "pp"
        );
        analysis
    }

    fn recommend(&self, portfolio: &Portfolio, ctx: &CycleContext) -> Vec<Recommendation> {
        let mut recommendations = self.rebalance(portfolio, ctx);

        if portfolio.cash > portfolio.total_value() * self.config.idle_cash_pct {
            recommendations.extend(self.deploy_cash(portfolio, ctx));
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionType;
    use crate::pricing::Fundamentals;
    use crate::strategies::test_support::{market, portfolio, snapshot, today};

    fn etfs() -> Vec<Fundamentals> {
        vec![
            snapshot("VTI", dec!(100), |_| {}),
            snapshot("TLT", dec!(100), |_| {}),
            snapshot("IEI", dec!(100), |_| {}),
            snapshot("GLD", dec!(100), |_| {}),
            snapshot("DBC", dec!(100), |_| {}),
        ]
    }

    fn strategy() -> RiskParityStrategy {
        RiskParityStrategy::new(RiskParityConfig::default())
    }

    #[test]
    fn test_default_weights_validate() {
        assert!(RiskParityConfig::default().validate().is_ok());

        let mut skewed = RiskParityConfig::default();
        skewed.targets[0].weight = dec!(0.5);
        let err = skewed.validate().unwrap_err();
        assert!(err.to_string().contains("must sum to 1"));
    }

    #[test]
    fn test_overweight_holding_is_sold_back_to_target() {
        let market = market(etfs());
        let ctx = CycleContext::new(&market, today());
        // VTI is 45% of a 100k portfolio; the rest sits on target weights
        let p = portfolio(
            dec!(0),
            &[
                ("VTI", dec!(450), dec!(100), dec!(100)),
                ("TLT", dec!(400), dec!(100), dec!(100)),
                ("IEI", dec!(150), dec!(100), dec!(100)),
            ],
        );

        let recs = strategy().recommend(&p, &ctx);
        let sell = recs
            .iter()
            .find(|r| r.symbol == "VTI")
            .expect("VTI should be rebalanced");
        assert_eq!(sell.action, TransactionType::Sell);
        assert_eq!(sell.shares, dec!(150));
        assert_eq!(sell.reasoning, "Rebalance: 45.0% -> 30.0%");

        // Weight after the sell is exactly the target
        let remaining = (dec!(450) - sell.shares) * dec!(100);
        assert_eq!(remaining / p.total_value(), dec!(0.30));
    }

    #[test]
    fn test_underweight_buy_needs_cash_for_the_gap() {
        let market = market(etfs());
        let ctx = CycleContext::new(&market, today());
        // GLD and DBC missing (7.5% each) but only 8k cash, below the 10% idle mark
        let p = portfolio(
            dec!(8000),
            &[
                ("VTI", dec!(300), dec!(100), dec!(100)),
                ("TLT", dec!(470), dec!(100), dec!(100)),
                ("IEI", dec!(150), dec!(100), dec!(100)),
            ],
        );

        let recs = strategy().recommend(&p, &ctx);
        // Drift of 7.5pp on GLD/DBC; each gap is 7.5k and fits in cash
        let buys: Vec<_> = recs.iter().filter(|r| r.action == TransactionType::Buy).collect();
        assert_eq!(buys.len(), 2);
        assert!(buys.iter().all(|r| r.shares == dec!(75)));
        assert!(recs.iter().all(|r| r.confidence == dec!(0.85)));
    }

    #[test]
    fn test_fresh_portfolio_gets_drift_buys_and_deployment() {
        let market = market(etfs());
        let ctx = CycleContext::new(&market, today());
        let recs = strategy().recommend(&portfolio(dec!(100000), &[]), &ctx);

        // Five drift buys followed by five pro-rata deployment buys
        assert_eq!(recs.len(), 10);
        assert_eq!(recs[0].symbol, "VTI");
        assert_eq!(recs[0].shares, dec!(300));
        assert_eq!(recs[5].symbol, "VTI");
        assert_eq!(recs[5].shares, dec!(270));
        assert_eq!(recs[5].confidence, dec!(0.9));
        assert_eq!(recs[6].shares, dec!(360));
        assert!(recs[5].reasoning.starts_with("Initial allocation: 30.0%"));
    }

    #[test]
    fn test_analysis_lists_targets() {
        let market = market(vec![]);
        let text = strategy().analyze(&CycleContext::new(&market, today()));
        assert!(text.contains("  - GLD: 7.5%"));
        assert!(text.contains("Rebalance threshold: 5pp drift"));
    }
}
