// Pricing module - point-in-time fundamentals with a freshness cache

pub mod fixtures;
pub mod yahoo;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

pub use fixtures::StaticFundamentals;
pub use yahoo::YahooFundamentals;

/// Default freshness window for cached fundamentals
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 15;

/// Price plus optional financial ratios for one security.
///
/// Ratios follow Yahoo conventions: growth rates, margins, ROE and dividend
/// yield are fractions (0.15 = 15%), debt/equity is a percentage (150 = 1.5x).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    pub symbol: String,
    pub price: Decimal,
    #[serde(default)]
    pub pe_ratio: Option<Decimal>,
    #[serde(default)]
    pub pb_ratio: Option<Decimal>,
    #[serde(default)]
    pub ps_ratio: Option<Decimal>,
    #[serde(default)]
    pub peg_ratio: Option<Decimal>,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    #[serde(default)]
    pub dividend_yield: Option<Decimal>,
    #[serde(default)]
    pub current_ratio: Option<Decimal>,
    #[serde(default)]
    pub debt_to_equity: Option<Decimal>,
    #[serde(default)]
    pub revenue_growth: Option<Decimal>,
    #[serde(default)]
    pub earnings_growth: Option<Decimal>,
    #[serde(default)]
    pub profit_margin: Option<Decimal>,
    #[serde(default)]
    pub return_on_equity: Option<Decimal>,
    #[serde(default)]
    pub beta: Option<Decimal>,
    #[serde(default)]
    pub fifty_two_week_high: Option<Decimal>,
    #[serde(default)]
    pub fifty_two_week_low: Option<Decimal>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl Fundamentals {
    /// Snapshot carrying only a price; ratios are filled in by the caller
    pub fn new(symbol: &str, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_ascii_uppercase(),
            price,
            pe_ratio: None,
            pb_ratio: None,
            ps_ratio: None,
            peg_ratio: None,
            market_cap: None,
            dividend_yield: None,
            current_ratio: None,
            debt_to_equity: None,
            revenue_growth: None,
            earnings_growth: None,
            profit_margin: None,
            return_on_equity: None,
            beta: None,
            fifty_two_week_high: None,
            fifty_two_week_low: None,
            sector: None,
            industry: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Source of fundamentals. `None` means the security is unavailable right now;
/// callers skip it rather than substituting defaults.
pub trait FundamentalsProvider {
    fn get(&self, symbol: &str) -> Option<Fundamentals>;
}

impl<P: FundamentalsProvider + ?Sized> FundamentalsProvider for &P {
    fn get(&self, symbol: &str) -> Option<Fundamentals> {
        (**self).get(symbol)
    }
}

impl<P: FundamentalsProvider + ?Sized> FundamentalsProvider for Box<P> {
    fn get(&self, symbol: &str) -> Option<Fundamentals> {
        (**self).get(symbol)
    }
}

/// Cache entry
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Fundamentals,
    timestamp: DateTime<Utc>,
}

/// Wraps a provider with a per-symbol cache (15 minute TTL by default).
/// Only successful lookups are cached.
pub struct CachedProvider<P> {
    inner: P,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl<P: FundamentalsProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_ttl(inner, Duration::minutes(DEFAULT_CACHE_TTL_MINUTES))
    }

    pub fn with_ttl(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear cache
    pub fn clear_cache(&self) {
        self.lock().clear();
        info!("Fundamentals cache cleared");
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.lock().len()
    }
}

impl<P: FundamentalsProvider> FundamentalsProvider for CachedProvider<P> {
    fn get(&self, symbol: &str) -> Option<Fundamentals> {
        let key = symbol.to_ascii_uppercase();

        {
            let cache = self.lock();
            if let Some(entry) = cache.get(&key) {
                let age = Utc::now().signed_duration_since(entry.timestamp);
                if age < self.ttl {
                    debug!("Cache hit for {} (age: {}s)", key, age.num_seconds());
                    return Some(entry.data.clone());
                }
            }
        }

        let data = self.inner.get(&key)?;
        self.lock().insert(
            key,
            CacheEntry {
                data: data.clone(),
                timestamp: Utc::now(),
            },
        );
        Some(data)
    }
}
