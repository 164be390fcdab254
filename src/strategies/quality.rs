//! Quality/moat scorer
//!
//! Wonderful companies at fair prices: a company needs at least two moat
//! signals and a blended quality score of 0.6 before it is bought, and it is
//! sold outright once the moat is gone or the multiple gets extreme.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

use super::sizing::capped_shares;
use super::{fixed, reported, CycleContext, Strategy};
use crate::db::{Portfolio, Recommendation, StrategyKind};
use crate::pricing::Fundamentals;

const WATCHLIST: [&str; 20] = [
    "AAPL", "KO", "AXP", "BAC", "CVX", "OXY", "KHC", "MCO", "DVA", "VRSN", "V", "MA", "JNJ",
    "PG", "WMT", "COST", "HD", "UNH", "JPM", "BRK-B",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub watchlist: Vec<String>,
    pub max_positions: usize,
    pub min_score: Decimal,
    /// Never buy above this P/E
    pub max_buy_pe: Decimal,
    /// Sell when P/E expands past this
    pub sell_pe: Decimal,
    /// Stop the buy scan once this many recommendations exist
    pub max_recommendations: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            watchlist: WATCHLIST.iter().map(|s| s.to_string()).collect(),
            max_positions: 10,
            min_score: dec!(0.6),
            max_buy_pe: dec!(30),
            sell_pe: dec!(50),
            max_recommendations: 2,
        }
    }
}

const SELL_CONFIDENCE: Decimal = dec!(0.80);
const MAX_BUY_CONFIDENCE: Decimal = dec!(0.95);
const VALUE_PCT: Decimal = dec!(0.15);
const CASH_PCT: Decimal = dec!(0.5);
/// Watchlist names covered by the market narrative
const ANALYZE_SCAN: usize = 10;

pub struct QualityStrategy {
    config: QualityConfig,
}

impl QualityStrategy {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// At least two of: high ROE, healthy margin, moderate leverage, growing sales
    pub fn has_moat(data: &Fundamentals) -> bool {
        let signals = [
            reported(data.return_on_equity).is_some_and(|v| v > dec!(0.15)),
            reported(data.profit_margin).is_some_and(|v| v > dec!(0.10)),
            data.debt_to_equity.is_some_and(|v| v < dec!(100)),
            reported(data.revenue_growth).is_some_and(|v| v > Decimal::ZERO),
        ];
        signals.iter().filter(|s| **s).count() >= 2
    }

    /// Average of the banded factors that are present, in [0, 1]
    pub fn quality_score(data: &Fundamentals) -> Decimal {
        let mut factors: Vec<Decimal> = Vec::with_capacity(5);

        if let Some(pe) = reported(data.pe_ratio) {
            factors.push(match pe {
                v if v < dec!(15) => dec!(1.0),
                v if v < dec!(20) => dec!(0.7),
                v if v < dec!(25) => dec!(0.4),
                _ => dec!(0.1),
            });
        }
        if let Some(roe) = reported(data.return_on_equity) {
            factors.push(match roe {
                v if v > dec!(0.20) => dec!(1.0),
                v if v > dec!(0.15) => dec!(0.7),
                v if v > dec!(0.10) => dec!(0.4),
                _ => Decimal::ZERO,
            });
        }
        if let Some(margin) = reported(data.profit_margin) {
            factors.push(match margin {
                v if v > dec!(0.20) => dec!(1.0),
                v if v > dec!(0.10) => dec!(0.6),
                _ => Decimal::ZERO,
            });
        }
        if let Some(de) = data.debt_to_equity {
            factors.push(match de {
                v if v < dec!(50) => dec!(1.0),
                v if v < dec!(100) => dec!(0.6),
                v if v < dec!(200) => dec!(0.3),
                _ => Decimal::ZERO,
            });
        }
        if let Some(current) = reported(data.current_ratio) {
            factors.push(match current {
                v if v > dec!(1.5) => dec!(0.8),
                v if v > dec!(1.0) => dec!(0.5),
                _ => Decimal::ZERO,
            });
        }

        if factors.is_empty() {
            return Decimal::ZERO;
        }
        factors.iter().sum::<Decimal>() / Decimal::from(factors.len())
    }

    fn is_buy_candidate(&self, data: &Fundamentals) -> bool {
        if !Self::has_moat(data) || Self::quality_score(data) < self.config.min_score {
            return false;
        }
        !reported(data.pe_ratio).is_some_and(|pe| pe > self.config.max_buy_pe)
    }

    fn should_sell(&self, data: &Fundamentals) -> bool {
        !Self::has_moat(data) || reported(data.pe_ratio).is_some_and(|pe| pe > self.config.sell_pe)
    }

    fn buy_reasoning(data: &Fundamentals, score: Decimal) -> String {
        let mut reasons = Vec::new();
        if let Some(roe) = reported(data.return_on_equity).filter(|v| *v > dec!(0.15)) {
            reasons.push(format!("Strong ROE of {}%", fixed(roe * Decimal::ONE_HUNDRED, 1)));
        }
        if let Some(margin) = reported(data.profit_margin).filter(|v| *v > dec!(0.10)) {
            reasons.push(format!("Healthy margins of {}%", fixed(margin * Decimal::ONE_HUNDRED, 1)));
        }
        if let Some(pe) = reported(data.pe_ratio).filter(|v| *v < dec!(20)) {
            reasons.push(format!("Reasonable P/E of {}", fixed(pe, 1)));
        }
        if data.debt_to_equity.is_some_and(|v| v < dec!(100)) {
            reasons.push("Conservative debt levels".to_string());
        }

        if reasons.is_empty() {
            format!("Quality score {}", fixed(score, 2))
        } else {
            format!("Quality score {}. {}", fixed(score, 2), reasons.join("; "))
        }
    }
}

impl Strategy for QualityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Quality
    }

    fn analyze(&self, ctx: &CycleContext) -> String {
        let mut opportunities: Vec<(&str, Decimal, Fundamentals)> = self
            .config
            .watchlist
            .iter()
            .take(ANALYZE_SCAN)
            .filter_map(|symbol| {
                let data = ctx.market.get(symbol)?;
                if !Self::has_moat(&data) {
                    return None;
                }
                let score = Self::quality_score(&data);
                (score >= self.config.min_score).then_some((symbol.as_str(), score, data))
            })
            .collect();
        opportunities.sort_by(|a, b| b.1.cmp(&a.1));

        let mut analysis = format!(
            "Date: {}\n\
             Philosophy: Buy wonderful companies at fair prices.\n\n\
             Market Scan Results:\n",
            ctx.today
        );
        for (symbol, score, data) in opportunities.iter().take(5) {
            let pe = reported(data.pe_ratio)
                .map(|v| fixed(v, 1))
                .unwrap_or_else(|| "N/A".to_string());
            let roe = reported(data.return_on_equity)
                .map(|v| fixed(v * Decimal::ONE_HUNDRED, 1))
                .unwrap_or_else(|| "N/A".to_string());
            let _ = writeln!(analysis, "- {}: Score {}, P/E {}, ROE {}%", symbol, fixed(*score, 2), pe, roe);
        }
        if opportunities.is_empty() {
            analysis.push_str("No compelling opportunities today. Cash is a position.\n");
        }
        analysis.push_str(
            "\nWisdom: 'The stock market is designed to transfer money from the Active to the Patient.'",
        );
        analysis
    }

    fn recommend(&self, portfolio: &Portfolio, ctx: &CycleContext) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        let held: BTreeSet<&str> = portfolio.positions.keys().map(String::as_str).collect();

        for position in portfolio.positions.values() {
            let Some(data) = ctx.market.get(&position.symbol) else {
                continue;
            };
            if self.should_sell(&data) {
                recommendations.push(Recommendation::sell(
                    &position.symbol,
                    position.shares,
                    "Moat deterioration or extreme overvaluation",
                    SELL_CONFIDENCE,
                ));
            }
        }

        if held.len() >= self.config.max_positions {
            return recommendations;
        }

        let total_value = portfolio.total_value();
        for symbol in &self.config.watchlist {
            if held.contains(symbol.as_str()) {
                continue;
            }
            let Some(data) = ctx.market.get(symbol) else {
                continue;
            };

            if self.is_buy_candidate(&data) {
                let score = Self::quality_score(&data);
                let shares = capped_shares(total_value, portfolio.cash, VALUE_PCT, CASH_PCT, data.price);
                if shares > Decimal::ZERO {
                    recommendations.push(Recommendation::buy(
                        symbol,
                        shares,
                        Self::buy_reasoning(&data, score),
                        score.min(MAX_BUY_CONFIDENCE),
                    ));
                }
            }

            // Sells count toward the cap as well
            if recommendations.len() >= self.config.max_recommendations {
                break;
            }
        }

        recommendations
    }
}
