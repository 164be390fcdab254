//! Decision strategies
//!
//! Each strategy encodes one investment philosophy. It reads market data
//! through a [`CycleContext`], never mutates the portfolio it is shown, and
//! returns recommendations in the order they should be executed. Tunables
//! live in per-strategy config structs fixed at construction.

pub mod deep_value;
pub mod garp;
pub mod passive;
pub mod quality;
pub mod risk_parity;
pub mod sizing;
pub mod thematic;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::{Portfolio, Recommendation, StrategyKind};
use crate::pricing::FundamentalsProvider;

pub use deep_value::{DeepValueConfig, DeepValueStrategy};
pub use garp::{GarpConfig, GarpStrategy, StockCategory};
pub use passive::{PassiveConfig, PassiveStrategy};
pub use quality::{QualityConfig, QualityStrategy};
pub use risk_parity::{AssetTarget, RiskParityConfig, RiskParityStrategy};
pub use thematic::{Theme, ThematicConfig, ThematicStrategy};

/// What a strategy can see during one cycle
pub struct CycleContext<'a> {
    pub market: &'a dyn FundamentalsProvider,
    pub today: NaiveDate,
}

impl<'a> CycleContext<'a> {
    pub fn new(market: &'a dyn FundamentalsProvider, today: NaiveDate) -> Self {
        Self { market, today }
    }
}

/// Common capability of every investment philosophy
pub trait Strategy {
    fn kind(&self) -> StrategyKind;

    /// Market narrative for the run record; reads market data only
    fn analyze(&self, ctx: &CycleContext) -> String;

    /// Ordered trade recommendations for the given portfolio
    fn recommend(&self, portfolio: &Portfolio, ctx: &CycleContext) -> Vec<Recommendation>;
}

/// Tunables for all six strategies, as read from the `[strategies]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategiesConfig {
    pub passive: PassiveConfig,
    pub quality: QualityConfig,
    pub deep_value: DeepValueConfig,
    pub garp: GarpConfig,
    pub risk_parity: RiskParityConfig,
    pub thematic: ThematicConfig,
}

impl StrategiesConfig {
    pub fn validate(&self) -> Result<()> {
        self.passive.validate()?;
        self.risk_parity.validate()?;
        Ok(())
    }
}

/// Build the strategy for `kind` from its configured tunables
pub fn build(kind: StrategyKind, config: &StrategiesConfig) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Passive => Box::new(PassiveStrategy::new(config.passive.clone())),
        StrategyKind::Quality => Box::new(QualityStrategy::new(config.quality.clone())),
        StrategyKind::DeepValue => Box::new(DeepValueStrategy::new(config.deep_value.clone())),
        StrategyKind::Garp => Box::new(GarpStrategy::new(config.garp.clone())),
        StrategyKind::RiskParity => Box::new(RiskParityStrategy::new(config.risk_parity.clone())),
        StrategyKind::Thematic => Box::new(ThematicStrategy::new(config.thematic.clone())),
    }
}

/// A ratio that counts as reported: present and non-zero.
/// Data feeds report missing ratios as 0 as often as they omit them.
pub(crate) fn reported(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| !v.is_zero())
}

/// `value` rounded half-even to `dp` places, zero padded
pub(crate) fn fixed(value: Decimal, dp: u32) -> String {
    let mut rounded = value.round_dp(dp);
    rounded.rescale(dp);
    rounded.to_string()
}

/// "12.3%" for a fraction of 0.123
pub(crate) fn pct(value: Decimal) -> String {
    format!("{}%", fixed(value * Decimal::ONE_HUNDRED, 1))
}
