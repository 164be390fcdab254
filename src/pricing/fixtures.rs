//! Offline fundamentals
//!
//! A fixed table of snapshots, loaded from a JSON file or built in code.
//! Lets a whole simulation run without network access, and is what the
//! tests drive the strategies with.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::{Fundamentals, FundamentalsProvider};

#[derive(Debug, Clone, Default)]
pub struct StaticFundamentals {
    data: HashMap<String, Fundamentals>,
}

impl StaticFundamentals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of snapshots, e.g. `[{"symbol": "VTI", "price": 250.0}]`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fundamentals file {:?}", path))?;
        let provider = Self::from_json_str(&raw)
            .with_context(|| format!("Failed to parse fundamentals file {:?}", path))?;
        info!("Loaded {} fundamentals snapshots from {:?}", provider.len(), path);
        Ok(provider)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let snapshots: Vec<Fundamentals> = serde_json::from_str(raw)?;
        Ok(snapshots.into_iter().collect())
    }

    /// Add or replace a snapshot (builder style)
    pub fn with(mut self, data: Fundamentals) -> Self {
        self.insert(data);
        self
    }

    /// Add a price-only snapshot
    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.with(Fundamentals::new(symbol, price))
    }

    pub fn insert(&mut self, mut data: Fundamentals) {
        data.symbol = data.symbol.to_ascii_uppercase();
        self.data.insert(data.symbol.clone(), data);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl FromIterator<Fundamentals> for StaticFundamentals {
    fn from_iter<I: IntoIterator<Item = Fundamentals>>(iter: I) -> Self {
        let mut provider = Self::new();
        for data in iter {
            provider.insert(data);
        }
        provider
    }
}

impl FundamentalsProvider for StaticFundamentals {
    fn get(&self, symbol: &str) -> Option<Fundamentals> {
        self.data.get(&symbol.to_ascii_uppercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_json_with_numeric_and_missing_fields() {
        let provider = StaticFundamentals::from_json_str(
            r#"[
                {"symbol": "vti", "price": 250.5},
                {"symbol": "KO", "price": 60, "pe_ratio": 22.1, "sector": "Consumer Defensive"}
            ]"#,
        )
        .unwrap();

        assert_eq!(provider.len(), 2);
        let vti = provider.get("VTI").unwrap();
        assert_eq!(vti.price, dec!(250.5));
        assert!(vti.pe_ratio.is_none());

        let ko = provider.get("ko").unwrap();
        assert_eq!(ko.pe_ratio, Some(dec!(22.1)));
        assert_eq!(ko.sector.as_deref(), Some("Consumer Defensive"));
        assert!(provider.get("PG").is_none());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(StaticFundamentals::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fundamentals.json");
        std::fs::write(&path, r#"[{"symbol": "BND", "price": 72}]"#).unwrap();

        let provider = StaticFundamentals::from_json_file(&path).unwrap();
        assert_eq!(provider.get("BND").unwrap().price, dec!(72));
        assert!(StaticFundamentals::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
