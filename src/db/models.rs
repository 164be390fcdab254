use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The six decision strategies the engine can run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Passive,    // Two-fund index allocation
    Quality,    // Moat and quality scoring
    DeepValue,  // Graham-style quantitative screen
    Garp,       // Growth at a reasonable price (PEG)
    RiskParity, // All-weather macro allocation
    Thematic,   // Disruptive innovation themes
}

impl StrategyKind {
    /// Every strategy, in the order a full cycle runs them
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Passive,
        StrategyKind::Quality,
        StrategyKind::DeepValue,
        StrategyKind::Garp,
        StrategyKind::RiskParity,
        StrategyKind::Thematic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Passive => "passive",
            StrategyKind::Quality => "quality",
            StrategyKind::DeepValue => "deep_value",
            StrategyKind::Garp => "garp",
            StrategyKind::RiskParity => "risk_parity",
            StrategyKind::Thematic => "thematic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::Passive => "Passive Allocator",
            StrategyKind::Quality => "Quality Moat",
            StrategyKind::DeepValue => "Deep Value",
            StrategyKind::Garp => "Growth at Reasonable Price",
            StrategyKind::RiskParity => "Macro Risk Parity",
            StrategyKind::Thematic => "Thematic Growth",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyKind::Passive => "Buy the haystack: stock/bond index funds at a fixed split",
            StrategyKind::Quality => "Wonderful companies with durable moats at fair prices",
            StrategyKind::DeepValue => "Strict quantitative screen with a margin of safety",
            StrategyKind::Garp => "Classify growers and buy them below a PEG ceiling",
            StrategyKind::RiskParity => "Fixed weights across five asset classes, rebalanced on drift",
            StrategyKind::Thematic => "High-growth innovation names, adding on deep drawdowns",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "passive" | "bogle" => Ok(StrategyKind::Passive),
            "quality" | "buffett" => Ok(StrategyKind::Quality),
            "deep_value" | "graham" => Ok(StrategyKind::DeepValue),
            "garp" | "lynch" => Ok(StrategyKind::Garp),
            "risk_parity" | "dalio" => Ok(StrategyKind::RiskParity),
            "thematic" | "wood" => Ok(StrategyKind::Thematic),
            _ => Err(()),
        }
    }
}

/// Transaction type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
    Dividend,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
            TransactionType::Dividend => "dividend",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            "dividend" => Ok(TransactionType::Dividend),
            _ => Err(()),
        }
    }
}

/// A holding inside a portfolio
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub shares: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
}

impl Position {
    pub fn new(symbol: &str, shares: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            shares,
            avg_cost: price,
            current_price: price,
        }
    }

    pub fn market_value(&self) -> Decimal {
        self.shares * self.current_price
    }

    pub fn gain_loss(&self) -> Decimal {
        (self.current_price - self.avg_cost) * self.shares
    }

    /// Unrealized gain as a fraction of cost (0.10 = +10%)
    pub fn gain_loss_pct(&self) -> Decimal {
        if self.avg_cost.is_zero() {
            return Decimal::ZERO;
        }
        (self.current_price - self.avg_cost) / self.avg_cost
    }
}

/// Cash plus positions managed by one strategy for one owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub owner: String,
    pub strategy: StrategyKind,
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn new(owner: &str, strategy: StrategyKind, cash: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            strategy,
            cash,
            positions: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_value(&self) -> Decimal {
        self.cash + self.positions_value()
    }

    pub fn positions_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }
}

/// Immutable ledger entry for an executed trade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub portfolio_id: String,
    pub owner: String,
    pub strategy: StrategyKind,
    pub transaction_type: TransactionType,
    pub symbol: String,
    pub shares: Decimal,
    pub price: Decimal,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn total_value(&self) -> Decimal {
        self.shares * self.price
    }
}

/// A trade a strategy would like to make
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub action: TransactionType,
    pub symbol: String,
    pub shares: Decimal,
    pub reasoning: String,
    pub confidence: Decimal,
}

impl Recommendation {
    pub fn buy(symbol: &str, shares: Decimal, reasoning: impl Into<String>, confidence: Decimal) -> Self {
        Self {
            action: TransactionType::Buy,
            symbol: symbol.to_string(),
            shares,
            reasoning: reasoning.into(),
            confidence,
        }
    }

    pub fn sell(symbol: &str, shares: Decimal, reasoning: impl Into<String>, confidence: Decimal) -> Self {
        Self {
            action: TransactionType::Sell,
            symbol: symbol.to_string(),
            shares,
            reasoning: reasoning.into(),
            confidence,
        }
    }
}

/// Audit record of one orchestration cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub strategy: StrategyKind,
    pub owner: String,
    pub run_date: DateTime<Utc>,
    pub analysis: String,
    pub recommendations: Vec<Recommendation>,
    pub executed_trades: Vec<String>,
    pub value_before: Decimal,
    pub value_after: Decimal,
    pub duration_seconds: f64,
}

impl Run {
    pub fn value_change(&self) -> Decimal {
        self.value_after - self.value_before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_derived_values() {
        let mut pos = Position::new("AAPL", dec!(10), dec!(100));
        pos.current_price = dec!(120);
        assert_eq!(pos.market_value(), dec!(1200));
        assert_eq!(pos.gain_loss(), dec!(200));
        assert_eq!(pos.gain_loss_pct(), dec!(0.2));
    }

    #[test]
    fn test_gain_loss_pct_zero_cost() {
        let mut pos = Position::new("FREE", dec!(5), dec!(0));
        pos.current_price = dec!(10);
        assert_eq!(pos.gain_loss_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_portfolio_total_value() {
        let mut portfolio = Portfolio::new("alice", StrategyKind::Passive, dec!(1000));
        portfolio
            .positions
            .insert("VTI".into(), Position::new("VTI", dec!(4), dec!(250)));
        assert_eq!(portfolio.total_value(), dec!(2000));
        assert!(portfolio.holds("VTI"));
        assert_eq!(portfolio.num_positions(), 1);
    }

    #[test]
    fn test_strategy_kind_parsing_accepts_aliases() {
        assert_eq!("graham".parse::<StrategyKind>(), Ok(StrategyKind::DeepValue));
        assert_eq!("Deep-Value".parse::<StrategyKind>(), Ok(StrategyKind::DeepValue));
        assert_eq!("dalio".parse::<StrategyKind>(), Ok(StrategyKind::RiskParity));
        assert!("soros".parse::<StrategyKind>().is_err());
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_recommendation_serializes_as_dict() {
        let rec = Recommendation::buy("KO", dec!(3), "cheap", dec!(0.8));
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["action"], "buy");
        assert_eq!(json["symbol"], "KO");
        assert_eq!(json["confidence"], "0.8");
    }
}
