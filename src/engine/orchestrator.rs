//! One analyze → recommend → execute → record cycle per (owner, strategy)

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::execution::{Execution, ExecutionEngine};
use crate::config::Settings;
use crate::db::{Portfolio, Repository, Run, StrategyKind, Transaction};
use crate::error::CouncilError;
use crate::notify::{LogNotifier, Notifier, NullNotifier};
use crate::pricing::FundamentalsProvider;
use crate::reports::PortfolioSummary;
use crate::strategies::{self, CycleContext};

/// Result of one strategy inside `run_all`
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub strategy: StrategyKind,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success {
        run_id: String,
        trades: usize,
        value_change: Decimal,
    },
    Error {
        error: String,
    },
}

impl CycleOutcome {
    fn from_result(strategy: StrategyKind, result: Result<Run>) -> Self {
        let status = match result {
            Ok(run) => OutcomeStatus::Success {
                run_id: run.id.clone(),
                trades: run.executed_trades.len(),
                value_change: run.value_change(),
            },
            Err(e) => OutcomeStatus::Error {
                error: format!("{:#}", e),
            },
        };
        Self { strategy, status }
    }

    pub fn trades(&self) -> usize {
        match &self.status {
            OutcomeStatus::Success { trades, .. } => *trades,
            OutcomeStatus::Error { .. } => 0,
        }
    }

    pub fn value_change(&self) -> Decimal {
        match &self.status {
            OutcomeStatus::Success { value_change, .. } => *value_change,
            OutcomeStatus::Error { .. } => Decimal::ZERO,
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self.status, OutcomeStatus::Error { .. })
    }
}

/// Weekdays are market days; exchange holidays are not modelled
pub fn is_market_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub struct Orchestrator<'a> {
    repo: &'a dyn Repository,
    market: &'a dyn FundamentalsProvider,
    settings: &'a Settings,
    notifier: &'a dyn Notifier,
    today: NaiveDate,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        market: &'a dyn FundamentalsProvider,
        settings: &'a Settings,
    ) -> Self {
        let notifier: &'a dyn Notifier = if settings.notifications {
            &LogNotifier
        } else {
            &NullNotifier
        };
        Self {
            repo,
            market,
            settings,
            notifier,
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Evaluate calendar-dependent rules as of `date`
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.today = date;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Run one full cycle for `owner` under `kind` and return the persisted run record.
    ///
    /// A repository error aborts the cycle: trades already executed stay
    /// applied and logged, but neither the portfolio snapshot nor a run
    /// record is written.
    pub fn run_cycle(&self, owner: &str, kind: StrategyKind) -> Result<Run> {
        validate_owner(owner)?;
        let started = Instant::now();
        let run_date = Utc::now();
        info!("Starting {} run for {}", kind, owner);

        let mut portfolio = self.load_or_create(owner, kind)?;
        self.refresh_prices(&mut portfolio);
        let value_before = portfolio.total_value();

        let strategy = strategies::build(kind, &self.settings.strategies);
        let ctx = CycleContext::new(self.market, self.today);
        let analysis = strategy.analyze(&ctx);
        let recommendations = strategy.recommend(&portfolio, &ctx);
        info!("{} produced {} recommendations", kind, recommendations.len());

        let engine = ExecutionEngine::new(self.market, self.repo);
        let mut executed_trades = Vec::new();
        for rec in &recommendations {
            if rec.confidence < self.settings.confidence_threshold {
                debug!(
                    "Skipping {} {} (confidence {} below {})",
                    rec.action.as_str(),
                    rec.symbol,
                    rec.confidence,
                    self.settings.confidence_threshold
                );
                continue;
            }
            let execution = engine
                .execute(&mut portfolio, rec)
                .with_context(|| format!("{} run aborted while executing {} {}", kind, rec.action.as_str(), rec.symbol))?;
            if let Execution::Filled(txn) = execution {
                self.notify_trade(&txn);
                executed_trades.push(txn.id);
            }
        }

        self.refresh_prices(&mut portfolio);
        let value_after = portfolio.total_value();

        self.repo
            .put_portfolio(&portfolio)
            .with_context(|| format!("Failed to save {} portfolio for {}", kind, owner))?;

        let run = Run {
            id: Uuid::new_v4().to_string(),
            strategy: kind,
            owner: owner.to_string(),
            run_date,
            analysis,
            recommendations,
            executed_trades,
            value_before,
            value_after,
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        self.repo
            .put_run(&run)
            .with_context(|| format!("Failed to record {} run for {}", kind, owner))?;

        info!(
            "{} run complete: {} trades, value {} -> {}",
            kind,
            run.executed_trades.len(),
            value_before.round_dp(2),
            value_after.round_dp(2)
        );
        if let Err(e) = self.notifier.run_completed(owner, &run) {
            warn!("Run notification failed: {:#}", e);
        }
        Ok(run)
    }

    /// Every strategy in fixed order; one failure does not stop the rest
    pub fn run_all(&self, owner: &str) -> Vec<CycleOutcome> {
        let outcomes: Vec<CycleOutcome> = StrategyKind::ALL
            .into_iter()
            .map(|kind| {
                let result = self.run_cycle(owner, kind);
                if let Err(e) = &result {
                    warn!("{} run failed for {}: {:#}", kind, owner, e);
                }
                CycleOutcome::from_result(kind, result)
            })
            .collect();

        let trades: usize = outcomes.iter().map(CycleOutcome::trades).sum();
        if trades > 0 {
            if let Err(e) = self.notifier.cycle_summary(owner, &outcomes) {
                warn!("Summary notification failed for {}: {:#}", owner, e);
            }
        }
        outcomes
    }

    /// Current value and holdings with fresh prices, or `None` if the portfolio
    /// was never created. Nothing is persisted.
    pub fn summarize(&self, owner: &str, kind: StrategyKind) -> Result<Option<PortfolioSummary>> {
        validate_owner(owner)?;
        let Some(mut portfolio) = self.repo.get_portfolio(owner, kind)? else {
            return Ok(None);
        };
        self.refresh_prices(&mut portfolio);
        Ok(Some(PortfolioSummary::from_portfolio(&portfolio)))
    }

    /// Summaries of every portfolio the owner has, in strategy order
    pub fn portfolios(&self, owner: &str) -> Result<Vec<PortfolioSummary>> {
        validate_owner(owner)?;
        let mut portfolios = self.repo.list_portfolios(owner)?;
        Ok(portfolios
            .iter_mut()
            .map(|p| {
                self.refresh_prices(p);
                PortfolioSummary::from_portfolio(p)
            })
            .collect())
    }

    pub fn runs(&self, kind: StrategyKind, limit: usize) -> Result<Vec<Run>> {
        self.repo.get_runs(kind, limit)
    }

    pub fn transactions(&self, owner: &str, limit: usize) -> Result<Vec<Transaction>> {
        validate_owner(owner)?;
        self.repo.get_transactions(owner, limit)
    }

    fn load_or_create(&self, owner: &str, kind: StrategyKind) -> Result<Portfolio> {
        if let Some(portfolio) = self.repo.get_portfolio(owner, kind)? {
            return Ok(portfolio);
        }

        let portfolio = Portfolio::new(owner, kind, self.settings.starting_cash);
        self.repo
            .put_portfolio(&portfolio)
            .with_context(|| format!("Failed to create {} portfolio for {}", kind, owner))?;
        info!(
            "Initialized {} portfolio for {} with {}",
            kind, owner, self.settings.starting_cash
        );
        Ok(portfolio)
    }

    /// Overwrite each position's price; failed lookups keep the last price
    fn refresh_prices(&self, portfolio: &mut Portfolio) {
        for position in portfolio.positions.values_mut() {
            match self.market.get(&position.symbol) {
                Some(data) if data.price > Decimal::ZERO => position.current_price = data.price,
                _ => debug!("Keeping last price {} for {}", position.current_price, position.symbol),
            }
        }
    }

    fn notify_trade(&self, txn: &Transaction) {
        if let Err(e) = self.notifier.trade_executed(txn) {
            warn!("Trade notification failed for {}: {:#}", txn.id, e);
        }
    }
}

fn validate_owner(owner: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(CouncilError::InvalidInput("owner must not be empty".to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryRepository, Position, TransactionType};
    use crate::pricing::StaticFundamentals;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNotifier {
        runs: RefCell<Vec<String>>,
        trades: RefCell<Vec<String>>,
        summaries: RefCell<usize>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn run_completed(&self, _owner: &str, run: &Run) -> Result<()> {
            self.runs.borrow_mut().push(run.id.clone());
            if self.fail {
                anyhow::bail!("smtp down");
            }
            Ok(())
        }

        fn trade_executed(&self, txn: &Transaction) -> Result<()> {
            self.trades.borrow_mut().push(txn.symbol.clone());
            if self.fail {
                anyhow::bail!("smtp down");
            }
            Ok(())
        }

        fn cycle_summary(&self, _owner: &str, _outcomes: &[CycleOutcome]) -> Result<()> {
            *self.summaries.borrow_mut() += 1;
            Ok(())
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn passive_market() -> StaticFundamentals {
        StaticFundamentals::new()
            .with_price("VTI", dec!(250))
            .with_price("BND", dec!(72))
    }

    #[test]
    fn test_market_days() {
        assert!(is_market_day(monday()));
        assert!(!is_market_day(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        assert!(!is_market_day(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()));
    }

    #[test]
    fn test_first_run_creates_portfolio_and_deploys_cash() {
        let repo = InMemoryRepository::new();
        let market = passive_market();
        let settings = Settings::default();
        let notifier = RecordingNotifier::default();
        let orchestrator = Orchestrator::new(&repo, &market, &settings)
            .with_date(monday())
            .with_notifier(&notifier);

        let run = orchestrator.run_cycle("alice", StrategyKind::Passive).unwrap();

        assert_eq!(run.owner, "alice");
        assert_eq!(run.executed_trades.len(), 2);
        assert_eq!(run.value_before, dec!(100000));
        assert_eq!(run.value_after, dec!(100000));
        assert_eq!(run.recommendations.len(), 2);
        assert!(run.analysis.contains("deploying new capital"));

        let portfolio = repo.get_portfolio("alice", StrategyKind::Passive).unwrap().unwrap();
        assert_eq!(portfolio.position("VTI").unwrap().shares, dec!(280));
        assert_eq!(portfolio.position("BND").unwrap().shares, dec!(416));
        assert_eq!(portfolio.cash, dec!(100000) - dec!(70000) - dec!(29952));

        assert_eq!(*notifier.trades.borrow(), vec!["VTI", "BND"]);
        assert_eq!(*notifier.runs.borrow(), vec![run.id.clone()]);
        assert_eq!(repo.run_count(), 1);
    }

    #[test]
    fn test_low_confidence_recommendations_are_recorded_not_executed() {
        let repo = InMemoryRepository::new();
        let market = passive_market();
        let mut settings = Settings::default();
        settings.confidence_threshold = dec!(0.96);
        let orchestrator = Orchestrator::new(&repo, &market, &settings).with_date(monday());

        let run = orchestrator.run_cycle("alice", StrategyKind::Passive).unwrap();
        assert_eq!(run.recommendations.len(), 2);
        assert!(run.executed_trades.is_empty());
        assert_eq!(repo.transaction_count(), 0);
    }

    #[test]
    fn test_unavailable_data_changes_nothing() {
        let repo = InMemoryRepository::new();
        let market = StaticFundamentals::new();
        let settings = Settings::default();
        let orchestrator = Orchestrator::new(&repo, &market, &settings).with_date(monday());

        for kind in StrategyKind::ALL {
            for _ in 0..2 {
                let run = orchestrator.run_cycle("bob", kind).unwrap();
                assert!(run.executed_trades.is_empty());
                assert_eq!(run.value_before, run.value_after);
            }
            let portfolio = repo.get_portfolio("bob", kind).unwrap().unwrap();
            assert_eq!(portfolio.cash, dec!(100000));
            assert!(portfolio.positions.is_empty());
        }
        assert_eq!(repo.transaction_count(), 0);
    }

    #[test]
    fn test_price_refresh_keeps_last_price_on_miss() {
        let repo = InMemoryRepository::new();
        let market = StaticFundamentals::new().with_price("KO", dec!(70));
        let settings = Settings::default();

        let mut portfolio = Portfolio::new("carol", StrategyKind::Quality, dec!(0));
        portfolio.positions.insert("KO".into(), Position::new("KO", dec!(10), dec!(60)));
        portfolio.positions.insert("DVA".into(), Position::new("DVA", dec!(5), dec!(120)));
        repo.put_portfolio(&portfolio).unwrap();

        let summary = Orchestrator::new(&repo, &market, &settings)
            .summarize("carol", StrategyKind::Quality)
            .unwrap()
            .unwrap();
        assert_eq!(summary.total_value, dec!(1300));

        // summarize never persists
        let stored = repo.get_portfolio("carol", StrategyKind::Quality).unwrap().unwrap();
        assert_eq!(stored.position("KO").unwrap().current_price, dec!(60));
    }

    #[test]
    fn test_summarize_unknown_portfolio_is_none() {
        let repo = InMemoryRepository::new();
        let market = StaticFundamentals::new();
        let settings = Settings::default();
        let orchestrator = Orchestrator::new(&repo, &market, &settings);
        assert!(orchestrator.summarize("nobody", StrategyKind::Garp).unwrap().is_none());
    }

    #[test]
    fn test_repository_failure_aborts_without_run_record() {
        let repo = InMemoryRepository::new();
        let market = passive_market();
        let settings = Settings::default();
        repo.put_portfolio(&Portfolio::new("alice", StrategyKind::Passive, dec!(100000)))
            .unwrap();
        repo.set_fail_writes(true);

        let err = Orchestrator::new(&repo, &market, &settings)
            .with_date(monday())
            .run_cycle("alice", StrategyKind::Passive)
            .unwrap_err();

        assert!(err.downcast_ref::<CouncilError>().is_some());
        assert_eq!(repo.run_count(), 0);
        let stored = repo.get_portfolio("alice", StrategyKind::Passive).unwrap().unwrap();
        assert_eq!(stored.cash, dec!(100000));
    }

    #[test]
    fn test_notifier_failures_do_not_fail_the_run() {
        let repo = InMemoryRepository::new();
        let market = passive_market();
        let settings = Settings::default();
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let run = Orchestrator::new(&repo, &market, &settings)
            .with_date(monday())
            .with_notifier(&notifier)
            .run_cycle("alice", StrategyKind::Passive)
            .unwrap();
        assert_eq!(run.executed_trades.len(), 2);
        assert_eq!(notifier.trades.borrow().len(), 2);
    }

    #[test]
    fn test_run_all_collects_every_strategy() {
        let repo = InMemoryRepository::new();
        let market = passive_market();
        let settings = Settings::default();
        let notifier = RecordingNotifier::default();

        let outcomes = Orchestrator::new(&repo, &market, &settings)
            .with_date(monday())
            .with_notifier(&notifier)
            .run_all("alice");

        let order: Vec<StrategyKind> = outcomes.iter().map(|o| o.strategy).collect();
        assert_eq!(order, StrategyKind::ALL.to_vec());
        assert!(outcomes.iter().all(|o| !o.is_err()));
        assert!(outcomes[0].trades() >= 2);
        assert_eq!(*notifier.summaries.borrow(), 1);
        assert_eq!(repo.list_portfolios("alice").unwrap().len(), 6);
    }

    #[test]
    fn test_run_all_reports_failures_per_strategy() {
        let repo = InMemoryRepository::new();
        let market = StaticFundamentals::new();
        let settings = Settings::default();
        repo.set_fail_writes(true);
        let notifier = RecordingNotifier::default();

        let outcomes = Orchestrator::new(&repo, &market, &settings)
            .with_notifier(&notifier)
            .run_all("dave");
        assert_eq!(outcomes.len(), 6);
        assert!(outcomes.iter().all(CycleOutcome::is_err));
        assert_eq!(*notifier.summaries.borrow(), 0);

        let json = serde_json::to_value(&outcomes[0]).unwrap();
        assert_eq!(json["strategy"], "passive");
        assert_eq!(json["status"], "error");
        assert!(json["error"].as_str().unwrap().contains("repository error"));
    }

    #[test]
    fn test_empty_owner_is_invalid_input() {
        let repo = InMemoryRepository::new();
        let market = StaticFundamentals::new();
        let settings = Settings::default();
        let err = Orchestrator::new(&repo, &market, &settings)
            .run_cycle("  ", StrategyKind::Passive)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CouncilError>(),
            Some(CouncilError::InvalidInput(_))
        ));
        assert_eq!(repo.list_portfolios("  ").unwrap().len(), 0);
    }

    #[test]
    fn test_history_reads_newest_first() {
        let repo = InMemoryRepository::new();
        let market = passive_market();
        let settings = Settings::default();
        let orchestrator = Orchestrator::new(&repo, &market, &settings).with_date(monday());

        let first = orchestrator.run_cycle("alice", StrategyKind::Passive).unwrap();
        let second = orchestrator.run_cycle("alice", StrategyKind::Passive).unwrap();

        let runs = orchestrator.runs(StrategyKind::Passive, 10).unwrap();
        assert_eq!(runs[0].id, second.id);
        assert_eq!(runs[1].id, first.id);

        let txns = orchestrator.transactions("alice", 1).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].transaction_type, TransactionType::Buy);
    }
}
