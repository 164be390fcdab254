//! Growth at a reasonable price
//!
//! Classifies every name by its growth profile and buys only fast growers
//! and stalwarts whose PEG ratio is under the ceiling.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Write};

use super::sizing::capped_shares;
use super::{fixed, reported, CycleContext, Strategy};
use crate::db::{Portfolio, Recommendation, StrategyKind};
use crate::pricing::Fundamentals;

const WATCHLIST: [&str; 27] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA", "TSLA", "HD", "NKE", "SBUX", "MCD", "DIS",
    "TGT", "COST", "WMT", "LULU", "CMG", "NFLX", "CRM", "ADBE", "NOW", "SHOP", "SQ", "PYPL",
    "V", "MA", "AXP",
];

const CYCLICAL_SECTORS: [&str; 3] = ["Energy", "Materials", "Industrials"];

/// Growth profile of a company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockCategory {
    SlowGrower,
    Stalwart,
    FastGrower,
    Cyclical,
    Turnaround,
    AssetPlay,
}

impl StockCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockCategory::SlowGrower => "slow_grower",
            StockCategory::Stalwart => "stalwart",
            StockCategory::FastGrower => "fast_grower",
            StockCategory::Cyclical => "cyclical",
            StockCategory::Turnaround => "turnaround",
            StockCategory::AssetPlay => "asset_play",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StockCategory::SlowGrower => "Slow Grower",
            StockCategory::Stalwart => "Stalwart",
            StockCategory::FastGrower => "Fast Grower",
            StockCategory::Cyclical => "Cyclical",
            StockCategory::Turnaround => "Turnaround",
            StockCategory::AssetPlay => "Asset Play",
        }
    }

    /// Only these categories are bought
    pub fn is_buyable(&self) -> bool {
        matches!(self, StockCategory::FastGrower | StockCategory::Stalwart)
    }
}

impl fmt::Display for StockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GarpConfig {
    pub watchlist: Vec<String>,
    /// Buy only below this PEG
    pub max_peg: Decimal,
    /// Sell holdings above this PEG
    pub sell_peg: Decimal,
    pub max_positions: usize,
    pub max_buys: usize,
}

impl Default for GarpConfig {
    fn default() -> Self {
        Self {
            watchlist: WATCHLIST.iter().map(|s| s.to_string()).collect(),
            max_peg: dec!(1.5),
            sell_peg: dec!(2.5),
            max_positions: 15,
            max_buys: 2,
        }
    }
}

const VALUE_PCT: Decimal = dec!(0.10);
const CASH_PCT: Decimal = dec!(0.4);

pub struct GarpStrategy {
    config: GarpConfig,
}

impl GarpStrategy {
    pub fn new(config: GarpConfig) -> Self {
        Self { config }
    }

    /// P/E over growth percentage; a positive supplied PEG takes precedence.
    /// Undefined without positive earnings or positive growth.
    pub fn peg(data: &Fundamentals) -> Option<Decimal> {
        let pe = data.pe_ratio.filter(|pe| *pe > Decimal::ZERO)?;
        if let Some(peg) = data.peg_ratio.filter(|peg| *peg > Decimal::ZERO) {
            return Some(peg);
        }
        let growth = data.earnings_growth.filter(|g| *g > Decimal::ZERO)?;
        Some(pe / (growth * Decimal::ONE_HUNDRED))
    }

    /// First matching rule wins: growth bands, then book value, then sector
    pub fn classify(data: &Fundamentals) -> StockCategory {
        let growth = data.earnings_growth.unwrap_or_default() * Decimal::ONE_HUNDRED;

        if growth > dec!(20) {
            return StockCategory::FastGrower;
        }
        if growth > dec!(10) {
            return StockCategory::Stalwart;
        }
        if growth > Decimal::ZERO {
            return StockCategory::SlowGrower;
        }
        if growth < dec!(-10) {
            return StockCategory::Turnaround;
        }
        if reported(data.pb_ratio).is_some_and(|pb| pb < Decimal::ONE) {
            return StockCategory::AssetPlay;
        }
        if data
            .sector
            .as_deref()
            .is_some_and(|sector| CYCLICAL_SECTORS.contains(&sector))
        {
            return StockCategory::Cyclical;
        }
        StockCategory::Stalwart
    }
}

impl Strategy for GarpStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Garp
    }

    fn analyze(&self, ctx: &CycleContext) -> String {
        let classified: Vec<(&str, StockCategory, Decimal, Fundamentals)> = self
            .config
            .watchlist
            .iter()
            .filter_map(|symbol| {
                let data = ctx.market.get(symbol)?;
                let peg = Self::peg(&data)?;
                Some((symbol.as_str(), Self::classify(&data), peg, data))
            })
            .collect();

        let mut analysis = format!(
            "Date: {}\n\
             Philosophy: Invest in what you know. PEG < 1 is a bargain.\n\n\
             Stock Classifications:\n",
            ctx.today
        );
        for category in [StockCategory::FastGrower, StockCategory::Stalwart] {
            let mut names: Vec<_> = classified.iter().filter(|c| c.1 == category).collect();
            names.sort_by(|a, b| a.2.cmp(&b.2));

            let _ = writeln!(analysis, "\n{}:", category.title());
            for (symbol, _, peg, data) in names.into_iter().take(3) {
                let growth = data.earnings_growth.unwrap_or_default() * Decimal::ONE_HUNDRED;
                let _ = writeln!(
                    analysis,
                    "  - {}: PEG {}, Growth {}%",
                    symbol,
                    fixed(*peg, 2),
                    fixed(growth, 0)
                );
            }
        }
        analysis.push_str(
            "\nWisdom: 'Go for a business that any idiot can run - because sooner or later, any idiot probably is going to run it.'",
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
            if let Some(peg) = Self::peg(&data).filter(|peg| *peg > self.config.sell_peg) {
                recommendations.push(Recommendation::sell(
                    &position.symbol,
                    position.shares,
                    format!("PEG expanded to {}, overvalued", fixed(peg, 2)),
                    dec!(0.75),
                ));
            }
        }

        if held.len() >= self.config.max_positions {
            return recommendations;
        }

        let mut candidates: Vec<(&str, Decimal, StockCategory, Fundamentals)> = self
            .config
            .watchlist
            .iter()
            .filter(|symbol| !held.contains(symbol.as_str()))
            .filter_map(|symbol| {
                let data = ctx.market.get(symbol)?;
                let peg = Self::peg(&data).filter(|peg| *peg < self.config.max_peg)?;
                let category = Self::classify(&data);
                category
                    .is_buyable()
                    .then_some((symbol.as_str(), peg, category, data))
            })
            .collect();
        // Stable sort keeps watchlist order among equal PEGs
        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let total_value = portfolio.total_value();
        for (symbol, peg, category, data) in candidates.into_iter().take(self.config.max_buys) {
            let shares = capped_shares(total_value, portfolio.cash, VALUE_PCT, CASH_PCT, data.price);
            if shares > Decimal::ZERO {
                recommendations.push(Recommendation::buy(
                    symbol,
                    shares,
                    format!("{}: PEG {}", category, fixed(peg, 2)),
                    (Decimal::ONE - peg / Decimal::TWO).min(dec!(0.9)),
                ));
            }
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionType;
    use crate::strategies::test_support::{market, portfolio, snapshot, today};

    fn grower(symbol: &str, price: Decimal, pe: Decimal, growth: Decimal) -> Fundamentals {
        snapshot(symbol, price, |f| {
            f.pe_ratio = Some(pe);
            f.earnings_growth = Some(growth);
        })
    }

    #[test]
    fn test_peg_from_pe_and_growth() {
        let data = grower("X", dec!(1), dec!(20), dec!(0.20));
        assert_eq!(GarpStrategy::peg(&data), Some(dec!(1)));
        assert_eq!(GarpStrategy::classify(&data), StockCategory::Stalwart);
    }

    #[test]
    fn test_peg_prefers_supplied_value_and_rejects_bad_inputs() {
        let mut data = grower("X", dec!(1), dec!(30), dec!(0.25));
        data.peg_ratio = Some(dec!(0.8));
        assert_eq!(GarpStrategy::peg(&data), Some(dec!(0.8)));

        // A non-positive supplied PEG falls back to the computed one
        data.peg_ratio = Some(dec!(-1.2));
        assert_eq!(GarpStrategy::peg(&data), Some(dec!(1.2)));

        assert_eq!(GarpStrategy::peg(&grower("X", dec!(1), dec!(-5), dec!(0.2))), None);
        assert_eq!(GarpStrategy::peg(&grower("X", dec!(1), dec!(15), dec!(-0.1))), None);
        assert_eq!(GarpStrategy::peg(&snapshot("X", dec!(1), |f| f.pe_ratio = Some(dec!(15)))), None);
    }

    #[test]
    fn test_classification_priority() {
        let category = |growth: Option<Decimal>, pb: Option<Decimal>, sector: Option<&str>| {
            GarpStrategy::classify(&snapshot("X", dec!(1), |f| {
                f.earnings_growth = growth;
                f.pb_ratio = pb;
                f.sector = sector.map(str::to_string);
            }))
        };

        assert_eq!(category(Some(dec!(0.25)), Some(dec!(0.5)), None), StockCategory::FastGrower);
        assert_eq!(category(Some(dec!(0.15)), None, None), StockCategory::Stalwart);
        assert_eq!(category(Some(dec!(0.05)), None, Some("Energy")), StockCategory::SlowGrower);
        assert_eq!(category(Some(dec!(-0.2)), Some(dec!(0.5)), None), StockCategory::Turnaround);
        assert_eq!(category(Some(dec!(-0.05)), Some(dec!(0.7)), None), StockCategory::AssetPlay);
        assert_eq!(category(None, None, Some("Materials")), StockCategory::Cyclical);
        assert_eq!(category(None, Some(dec!(3)), Some("Technology")), StockCategory::Stalwart);
    }

    #[test]
    fn test_buys_lowest_peg_fast_growers_and_stalwarts() {
        let market = market(vec![
            grower("AAPL", dec!(100), dec!(30), dec!(0.25)), // PEG 1.2
            grower("MSFT", dec!(100), dec!(15), dec!(0.30)), // PEG 0.5
            grower("GOOGL", dec!(100), dec!(12), dec!(0.08)), // slow grower
            grower("AMZN", dec!(100), dec!(40), dec!(0.20)), // PEG 2.0
            grower("META", dec!(100), dec!(22), dec!(0.22)), // PEG 1.0
        ]);
        let ctx = CycleContext::new(&market, today());
        let strategy = GarpStrategy::new(GarpConfig::default());

        let recs = strategy.recommend(&portfolio(dec!(100000), &[]), &ctx);
        let symbols: Vec<&str> = recs.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["MSFT", "META"]);
        // min(10% of 100k, 40% of 100k) / 100
        assert_eq!(recs[0].shares, dec!(100));
        assert_eq!(recs[0].confidence, dec!(0.75));
        assert_eq!(recs[1].confidence, dec!(0.5));
        assert_eq!(recs[0].reasoning, "fast_grower: PEG 0.50");
    }

    #[test]
    fn test_sells_when_peg_expands() {
        let market = market(vec![grower("NFLX", dec!(600), dec!(60), dec!(0.2))]);
        let ctx = CycleContext::new(&market, today());
        let strategy = GarpStrategy::new(GarpConfig::default());

        let p = portfolio(dec!(0), &[("NFLX", dec!(8), dec!(400), dec!(600))]);
        let recs = strategy.recommend(&p, &ctx);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].action, TransactionType::Sell);
        assert_eq!(recs[0].shares, dec!(8));
        assert_eq!(recs[0].reasoning, "PEG expanded to 3.00, overvalued");
    }

    #[test]
    fn test_analysis_groups_categories() {
        let market = market(vec![grower("MSFT", dec!(100), dec!(15), dec!(0.30))]);
        let strategy = GarpStrategy::new(GarpConfig::default());
        let text = strategy.analyze(&CycleContext::new(&market, today()));
        assert!(text.contains("Fast Grower:\n  - MSFT: PEG 0.50, Growth 30%"));
        assert!(text.contains("\nStalwart:\n"));
    }
}
