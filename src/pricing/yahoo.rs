use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{StatusCode, Url};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Fundamentals, FundamentalsProvider};
use crate::error::CouncilError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const QUOTE_SUMMARY_MODULES: &str =
    "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile";

/// Yahoo Finance quoteSummary response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<SummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    price: PriceModule,
    #[serde(default)]
    summary_detail: SummaryDetail,
    #[serde(default)]
    default_key_statistics: KeyStatistics,
    #[serde(default)]
    financial_data: FinancialData,
    #[serde(default)]
    asset_profile: AssetProfile,
}

/// Yahoo wraps every number as `{"raw": 1.23, "fmt": "1.23"}` or `{}`
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PriceModule {
    regular_market_price: Option<RawValue>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryDetail {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    price_to_sales_trailing12_months: Option<RawValue>,
    dividend_yield: Option<RawValue>,
    beta: Option<RawValue>,
    fifty_two_week_high: Option<RawValue>,
    fifty_two_week_low: Option<RawValue>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KeyStatistics {
    price_to_book: Option<RawValue>,
    peg_ratio: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FinancialData {
    current_price: Option<RawValue>,
    current_ratio: Option<RawValue>,
    debt_to_equity: Option<RawValue>,
    revenue_growth: Option<RawValue>,
    earnings_growth: Option<RawValue>,
    profit_margins: Option<RawValue>,
    return_on_equity: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

fn decimal(value: &Option<RawValue>) -> Option<Decimal> {
    value
        .as_ref()
        .and_then(|v| v.raw)
        .filter(|f| f.is_finite())
        .and_then(Decimal::from_f64)
}

/// Cookie plus crumb pair Yahoo requires on quoteSummary requests
#[derive(Debug, Clone)]
struct Session {
    cookie: String,
    crumb: String,
}

/// Blocking Yahoo Finance fundamentals client.
///
/// Yahoo gates quoteSummary behind a session: a cookie handed out by
/// `fc.yahoo.com` and a crumb fetched with that cookie. The pair is cached per
/// client and dropped on a 401 so the next lookup performs a fresh handshake.
/// Offline and reproducible runs use [`StaticFundamentals`](super::StaticFundamentals)
/// through `--fundamentals` instead.
pub struct YahooFundamentals {
    client: Client,
    base_url: String,
    cookie_url: String,
    session: Mutex<Option<Session>>,
}

impl YahooFundamentals {
    pub fn new() -> Result<Self> {
        Self::with_urls("https://query2.finance.yahoo.com", "https://fc.yahoo.com")
    }

    /// Point both the API and the cookie handshake at `base_url`
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::with_urls(base_url, base_url)
    }

    pub fn with_urls(base_url: &str, cookie_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.to_string(),
            session: Mutex::new(None),
        })
    }

    fn cached_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_session(&self) -> Result<Session> {
        if let Some(session) = self.cached_session().as_ref() {
            return Ok(session.clone());
        }
        let session = self.handshake()?;
        *self.cached_session() = Some(session.clone());
        Ok(session)
    }

    fn handshake(&self) -> Result<Session> {
        debug!("Requesting Yahoo Finance session cookie");
        // The cookie endpoint answers 404 but still sets the cookie
        let response = self
            .client
            .get(&self.cookie_url)
            .send()
            .context("Failed to request Yahoo Finance cookie")?;
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(session_cookie)
            .ok_or_else(|| CouncilError::MarketData("Yahoo Finance set no session cookie".to_string()))?;

        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .header(COOKIE, &cookie)
            .send()
            .context("Failed to request Yahoo Finance crumb")?;
        if !response.status().is_success() {
            return Err(CouncilError::MarketData(format!(
                "Yahoo Finance crumb request returned {}",
                response.status()
            ))
            .into());
        }
        let crumb = response
            .text()
            .context("Failed to read Yahoo Finance crumb")?
            .trim()
            .to_string();
        if crumb.is_empty() {
            return Err(CouncilError::MarketData("Yahoo Finance returned an empty crumb".to_string()).into());
        }

        Ok(Session { cookie, crumb })
    }

    /// Fetch a fresh snapshot, bypassing any cache
    pub fn fetch(&self, symbol: &str) -> Result<Fundamentals> {
        let symbol = symbol.to_ascii_uppercase();
        info!("Fetching fundamentals for {} from Yahoo Finance", symbol);

        let session = self.ensure_session()?;
        let url = quote_url(&self.base_url, &symbol, &session.crumb)?;

        let response = self
            .client
            .get(url)
            .header(COOKIE, &session.cookie)
            .send()
            .context("Failed to send request to Yahoo Finance")?;

        if response.status() == StatusCode::UNAUTHORIZED {
            *self.cached_session() = None;
            return Err(CouncilError::MarketData("Yahoo Finance session expired".to_string()).into());
        }
        if !response.status().is_success() {
            return Err(CouncilError::MarketData(format!(
                "Yahoo Finance returned error status {} for {}",
                response.status(),
                symbol
            ))
            .into());
        }

        let body: QuoteSummaryResponse = response
            .json()
            .context("Failed to parse Yahoo Finance response")?;

        parse_summary(&symbol, body)
    }
}

/// `name=value` from a Set-Cookie header, without its attributes
fn session_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, _) = pair.split_once('=')?;
    (!name.trim().is_empty()).then(|| pair.to_string())
}

fn quote_url(base_url: &str, symbol: &str, crumb: &str) -> Result<Url> {
    Url::parse_with_params(
        &format!("{}/v10/finance/quoteSummary/{}", base_url, symbol),
        &[("modules", QUOTE_SUMMARY_MODULES), ("crumb", crumb)],
    )
    .with_context(|| format!("Invalid Yahoo Finance URL for {}", symbol))
}

fn parse_summary(symbol: &str, body: QuoteSummaryResponse) -> Result<Fundamentals> {
    if let Some(error) = body.quote_summary.error {
        return Err(CouncilError::MarketData(format!(
            "Yahoo Finance API error: {} - {}",
            error.code, error.description
        ))
        .into());
    }

    let result = body
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| CouncilError::MarketData(format!("no data returned for {}", symbol)))?;

    let price = decimal(&result.price.regular_market_price)
        .or_else(|| decimal(&result.financial_data.current_price))
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| CouncilError::MarketData(format!("No price data available for {}", symbol)))?;

    let detail = &result.summary_detail;
    let stats = &result.default_key_statistics;
    let financial = &result.financial_data;

    Ok(Fundamentals {
        symbol: symbol.to_string(),
        price,
        pe_ratio: decimal(&detail.trailing_pe),
        pb_ratio: decimal(&stats.price_to_book),
        ps_ratio: decimal(&detail.price_to_sales_trailing12_months),
        peg_ratio: decimal(&stats.peg_ratio),
        market_cap: decimal(&result.price.market_cap).or_else(|| decimal(&detail.market_cap)),
        dividend_yield: decimal(&detail.dividend_yield),
        current_ratio: decimal(&financial.current_ratio),
        debt_to_equity: decimal(&financial.debt_to_equity),
        revenue_growth: decimal(&financial.revenue_growth),
        earnings_growth: decimal(&financial.earnings_growth),
        profit_margin: decimal(&financial.profit_margins),
        return_on_equity: decimal(&financial.return_on_equity),
        beta: decimal(&detail.beta),
        fifty_two_week_high: decimal(&detail.fifty_two_week_high),
        fifty_two_week_low: decimal(&detail.fifty_two_week_low),
        sector: result.asset_profile.sector.clone(),
        industry: result.asset_profile.industry.clone(),
        fetched_at: Utc::now(),
    })
}

impl FundamentalsProvider for YahooFundamentals {
    fn get(&self, symbol: &str) -> Option<Fundamentals> {
        match self.fetch(symbol) {
            Ok(data) => {
                info!("Fetched fundamentals for {}: price={}", data.symbol, data.price);
                Some(data)
            }
            Err(e) => {
                warn!("Fundamentals unavailable for {}: {:#}", symbol, e);
                None
            }
        }
    }
}
