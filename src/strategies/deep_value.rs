//! Deep-value screener
//!
//! Hard quantitative screen plus a Graham intrinsic-value estimate. Buys only
//! with a wide margin of safety and keeps adding names until the portfolio is
//! diversified across `min_positions` holdings.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

use super::sizing::capped_shares;
use super::{fixed, reported, CycleContext, Strategy};
use crate::db::{Portfolio, Recommendation, StrategyKind};
use crate::pricing::Fundamentals;

/// Large-cap screening universe, S&P 500 constituents by weight
const UNIVERSE: [&str; 60] = [
    "AAPL", "MSFT", "AMZN", "NVDA", "GOOGL", "META", "BRK-B", "JPM", "JNJ", "V", "XOM", "UNH",
    "PG", "MA", "HD", "CVX", "MRK", "ABBV", "PEP", "KO", "COST", "AVGO", "WMT", "BAC", "MCD",
    "CSCO", "TMO", "PFE", "ABT", "CRM", "DIS", "CMCSA", "VZ", "INTC", "WFC", "NKE", "T", "BMY",
    "UPS", "MS", "LOW", "QCOM", "HON", "AMGN", "IBM", "CAT", "GS", "C", "GM", "F", "MO", "MMM",
    "DOW", "KHC", "COF", "MET", "PRU", "AIG", "CVS", "TGT",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepValueConfig {
    pub universe: Vec<String>,
    pub max_pe: Decimal,
    pub max_pb: Decimal,
    pub min_current_ratio: Decimal,
    /// Debt/equity expressed as a percentage (50 = 0.5x)
    pub max_debt_to_equity: Decimal,
    /// Sell holdings whose P/E expands past this
    pub take_profit_pe: Decimal,
    pub min_margin_of_safety: Decimal,
    /// Keep buying while holding fewer positions than this
    pub min_positions: usize,
    pub max_buys: usize,
}

impl Default for DeepValueConfig {
    fn default() -> Self {
        Self {
            universe: UNIVERSE.iter().map(|s| s.to_string()).collect(),
            max_pe: dec!(15),
            max_pb: dec!(1.5),
            min_current_ratio: dec!(2.0),
            max_debt_to_equity: dec!(50),
            take_profit_pe: dec!(20),
            min_margin_of_safety: dec!(0.25),
            min_positions: 20,
            max_buys: 3,
        }
    }
}

const BUY_SCAN: usize = 200;
const ANALYZE_SCAN: usize = 100;
/// Narrative threshold, looser than the buy threshold
const ANALYZE_MARGIN: Decimal = dec!(0.2);
const DEFAULT_GROWTH_PCT: Decimal = dec!(5);
const MAX_GROWTH_PCT: Decimal = dec!(15);
const VALUE_PCT: Decimal = dec!(0.05);
const CASH_PCT: Decimal = dec!(0.8);

pub struct DeepValueStrategy {
    config: DeepValueConfig,
}

impl DeepValueStrategy {
    pub fn new(config: DeepValueConfig) -> Self {
        Self { config }
    }

    /// All four thresholds must be reported and met
    pub fn passes_screen(&self, data: &Fundamentals) -> bool {
        let c = &self.config;
        data.pe_ratio.is_some_and(|pe| pe > Decimal::ZERO && pe < c.max_pe)
            && data.pb_ratio.is_some_and(|pb| pb < c.max_pb)
            && data.current_ratio.is_some_and(|cr| cr > c.min_current_ratio)
            && data.debt_to_equity.is_some_and(|de| de < c.max_debt_to_equity)
    }

    /// Graham's V = EPS × (8.5 + 2g), zero when earnings are unknown or negative
    pub fn intrinsic_value(data: &Fundamentals) -> Decimal {
        let Some(pe) = data.pe_ratio.filter(|pe| *pe > Decimal::ZERO) else {
            return Decimal::ZERO;
        };
        if data.price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let eps = data.price / pe;
        let growth = reported(data.earnings_growth)
            .map(|g| (g * Decimal::ONE_HUNDRED).clamp(Decimal::ZERO, MAX_GROWTH_PCT))
            .unwrap_or(DEFAULT_GROWTH_PCT);

        eps * (dec!(8.5) + Decimal::TWO * growth)
    }

    pub fn margin_of_safety(data: &Fundamentals, intrinsic: Decimal) -> Decimal {
        if intrinsic <= Decimal::ZERO || data.price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((intrinsic - data.price) / intrinsic).max(Decimal::ZERO)
    }

    /// Screened names with their margin, widest margin first
    fn bargains<'s>(
        &self,
        symbols: impl Iterator<Item = &'s String>,
        min_margin: Decimal,
        ctx: &CycleContext,
    ) -> Vec<(String, Decimal, Fundamentals)> {
        let mut found: Vec<_> = symbols
            .filter_map(|symbol| {
                let data = ctx.market.get(symbol)?;
                if !self.passes_screen(&data) {
                    return None;
                }
                let margin = Self::margin_of_safety(&data, Self::intrinsic_value(&data));
                (margin > min_margin).then(|| (symbol.clone(), margin, data))
            })
            .collect();
        found.sort_by(|a, b| b.1.cmp(&a.1));
        found
    }
}

impl Strategy for DeepValueStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DeepValue
    }

    fn analyze(&self, ctx: &CycleContext) -> String {
        let scanned = self.config.universe.len().min(ANALYZE_SCAN);
        let bargains = self.bargains(self.config.universe.iter().take(ANALYZE_SCAN), ANALYZE_MARGIN, ctx);
        let c = &self.config;

        let mut analysis = format!(
            "Date: {}\n\
             Philosophy: Buy $1 bills for $0.50.\n\n\
             Screening {} stocks against value criteria:\n\
             - P/E < {}\n\
             - P/B < {}\n\
             - Current Ratio > {}\n\
             - Debt/Equity < {}%\n\n\
             Bargains Found: {}\n",
            ctx.today,
            scanned,
            c.max_pe,
            c.max_pb,
            c.min_current_ratio,
            c.max_debt_to_equity,
            bargains.len()
        );
        for (symbol, margin, data) in bargains.iter().take(5) {
            let _ = writeln!(
                analysis,
                "- {}: {}% margin of safety, P/E {}, P/B {}",
                symbol,
                fixed(margin * Decimal::ONE_HUNDRED, 0),
                fixed(data.pe_ratio.unwrap_or_default(), 1),
                fixed(data.pb_ratio.unwrap_or_default(), 2),
            );
        }
        analysis.push_str(
            "\nWisdom: 'In the short run, the market is a voting machine but in the long run, it is a weighing machine.'",
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
            if !self.passes_screen(&data) {
                recommendations.push(Recommendation::sell(
                    &position.symbol,
                    position.shares,
                    "No longer meets value criteria",
                    dec!(0.75),
                ));
            } else if let Some(pe) = reported(data.pe_ratio).filter(|pe| *pe > self.config.take_profit_pe) {
                recommendations.push(Recommendation::sell(
                    &position.symbol,
                    position.shares,
                    format!("P/E expanded to {}, take profits", fixed(pe, 1)),
                    dec!(0.70),
                ));
            }
        }

        if held.len() >= self.config.min_positions {
            return recommendations;
        }

        let unheld = self
            .config
            .universe
            .iter()
            .take(BUY_SCAN)
            .filter(|s| !held.contains(s.as_str()));
        let candidates = self.bargains(unheld, self.config.min_margin_of_safety, ctx);

        let total_value = portfolio.total_value();
        for (symbol, margin, data) in candidates.into_iter().take(self.config.max_buys) {
            let shares = capped_shares(total_value, portfolio.cash, VALUE_PCT, CASH_PCT, data.price);
            if shares > Decimal::ZERO {
                recommendations.push(Recommendation::buy(
                    &symbol,
                    shares,
                    format!("Value bargain: {}% margin of safety", fixed(margin * Decimal::ONE_HUNDRED, 0)),
                    (dec!(0.5) + margin).min(dec!(0.9)),
                ));
            }
        }

        recommendations
    }
}
