//! Thematic growth scorer
//!
//! Concentrated bets on innovation themes. Smaller, faster-growing and more
//! volatile names score higher, and conviction holdings are added to after
//! deep drawdowns.

use itertools::Itertools;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

use super::sizing::shares_for;
use super::{fixed, reported, CycleContext, Strategy};
use crate::db::{Portfolio, Position, Recommendation, StrategyKind};
use crate::pricing::Fundamentals;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub symbols: Vec<String>,
}

impl Theme {
    pub fn new(name: &str, symbols: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// "artificial_intelligence" -> "Artificial Intelligence"
    pub fn title(&self) -> String {
        self.name
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThematicConfig {
    pub themes: Vec<Theme>,
    pub min_score: Decimal,
    pub max_buys: usize,
    /// Drawdown from the 52-week high that counts as a dip
    pub dip_drawdown: Decimal,
    /// Unrealized loss a holding must show before adding
    pub dip_loss: Decimal,
}

impl Default for ThematicConfig {
    fn default() -> Self {
        Self {
            themes: vec![
                Theme::new("artificial_intelligence", &["NVDA", "MSFT", "GOOGL", "PLTR", "PATH", "SNOW"]),
                Theme::new("robotics_automation", &["ISRG", "ABB", "ROK", "TER", "FANUY"]),
                Theme::new("energy_storage", &["TSLA", "ENPH", "SEDG", "RUN", "PLUG"]),
                Theme::new("genomics", &["CRSP", "BEAM", "NTLA", "EDIT", "PACB"]),
                Theme::new("blockchain", &["COIN", "SQ", "MSTR", "RIOT", "MARA"]),
                Theme::new("autonomous_mobility", &["TSLA", "UBER", "LYFT", "APTV", "LAZR"]),
            ],
            min_score: dec!(0.5),
            max_buys: 3,
            dip_drawdown: dec!(0.30),
            dip_loss: dec!(-0.20),
        }
    }
}

const BASE_PCT: Decimal = dec!(0.03);
const SCORE_PCT: Decimal = dec!(0.04);
const MAX_POSITION_PCT: Decimal = dec!(0.10);
const CASH_PCT: Decimal = dec!(0.3);
const DIP_SCORE: Decimal = dec!(0.7);
const DIP_CONFIDENCE: Decimal = dec!(0.75);
const SMALL_CAP: Decimal = dec!(10_000_000_000);
const MID_CAP: Decimal = dec!(50_000_000_000);

pub struct ThematicStrategy {
    config: ThematicConfig,
}

impl ThematicStrategy {
    pub fn new(config: ThematicConfig) -> Self {
        Self { config }
    }

    /// Every themed symbol once, in theme order
    pub fn universe(&self) -> Vec<&str> {
        self.config
            .themes
            .iter()
            .flat_map(|t| t.symbols.iter().map(String::as_str))
            .unique()
            .collect()
    }

    fn themes_of(&self, symbol: &str) -> Vec<&str> {
        self.config
            .themes
            .iter()
            .filter(|t| t.symbols.iter().any(|s| s == symbol))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Average of the growth, size and volatility bands that are present
    pub fn innovation_score(data: &Fundamentals) -> Decimal {
        let mut factors: Vec<Decimal> = Vec::with_capacity(3);

        if let Some(growth) = reported(data.revenue_growth) {
            factors.push(match growth {
                v if v > dec!(0.30) => dec!(1.0),
                v if v > dec!(0.20) => dec!(0.8),
                v if v > dec!(0.10) => dec!(0.5),
                _ => Decimal::ZERO,
            });
        }
        if let Some(cap) = reported(data.market_cap) {
            factors.push(match cap {
                v if v < SMALL_CAP => dec!(0.8),
                v if v < MID_CAP => dec!(0.6),
                _ => dec!(0.3),
            });
        }
        if let Some(beta) = reported(data.beta) {
            factors.push(match beta {
                v if v > dec!(1.5) => dec!(0.7),
                v if v > dec!(1.2) => dec!(0.5),
                _ => Decimal::ZERO,
            });
        }

        if factors.is_empty() {
            return Decimal::ZERO;
        }
        factors.iter().sum::<Decimal>() / Decimal::from(factors.len())
    }

    /// Conviction-weighted size: min(3% + score × 4%, 10%) of total, capped by 30% of cash
    fn position_size(portfolio: &Portfolio, price: Decimal, score: Decimal) -> Decimal {
        let value_pct = (BASE_PCT + score * SCORE_PCT).min(MAX_POSITION_PCT);
        let target = (portfolio.total_value() * value_pct).min(portfolio.cash * CASH_PCT);
        shares_for(target, price)
    }

    fn is_dip(&self, data: &Fundamentals, position: &Position) -> bool {
        let Some(high) = reported(data.fifty_two_week_high) else {
            return false;
        };
        if data.price <= Decimal::ZERO {
            return false;
        }
        let drawdown = (high - data.price) / high;
        drawdown > self.config.dip_drawdown && position.gain_loss_pct() < self.config.dip_loss
    }
}

impl Strategy for ThematicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Thematic
    }

    fn analyze(&self, ctx: &CycleContext) -> String {
        let mut analysis = format!(
            "Date: {}\n\
             Philosophy: We are on the right side of change.\n\n\
             Innovation Themes Analysis:\n",
            ctx.today
        );

        for theme in &self.config.themes {
            let _ = writeln!(analysis, "\n{}:", theme.title());
            let sampled = theme
                .symbols
                .iter()
                .take(3)
                .filter_map(|symbol| ctx.market.get(symbol))
                .take(2);
            for data in sampled {
                let growth = data.revenue_growth.unwrap_or_default() * Decimal::ONE_HUNDRED;
                let _ = writeln!(analysis, "  - {}: Revenue growth {}%", data.symbol, fixed(growth, 0));
            }
        }

        analysis.push_str(
            "\n5-Year Vision:\n\
             - AI will transform every industry\n\
             - Electric vehicles will dominate\n\
             - Genomics will revolutionize healthcare\n\
             - Bitcoin will become digital gold\n\n\
             Wisdom: 'Innovation solves problems. The bigger the problem, the bigger the opportunity.'",
        );
        analysis
    }

    fn recommend(&self, portfolio: &Portfolio, ctx: &CycleContext) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        let held: BTreeSet<&str> = portfolio.positions.keys().map(String::as_str).collect();

        let mut candidates: Vec<(&str, Decimal, Fundamentals)> = self
            .universe()
            .into_iter()
            .filter(|symbol| !held.contains(symbol))
            .filter_map(|symbol| {
                let data = ctx.market.get(symbol)?;
                let score = Self::innovation_score(&data);
                (score > self.config.min_score).then_some((symbol, score, data))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        for (symbol, score, data) in candidates.into_iter().take(self.config.max_buys) {
            let shares = Self::position_size(portfolio, data.price, score);
            if shares > Decimal::ZERO {
                recommendations.push(Recommendation::buy(
                    symbol,
                    shares,
                    format!(
                        "Innovation play ({}), score {}",
                        self.themes_of(symbol).join(", "),
                        fixed(score, 2)
                    ),
                    score.min(dec!(0.9)),
                ));
            }
        }

        for position in portfolio.positions.values() {
            let Some(data) = ctx.market.get(&position.symbol) else {
                continue;
            };
            if !self.is_dip(&data, position) {
                continue;
            }
            let shares = Self::position_size(portfolio, data.price, DIP_SCORE);
            if shares > Decimal::ZERO {
                recommendations.push(Recommendation::buy(
                    &position.symbol,
                    shares,
                    "Adding on weakness - conviction unchanged",
                    DIP_CONFIDENCE,
                ));
            }
        }

        recommendations
    }
}
