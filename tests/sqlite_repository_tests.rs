use chrono::NaiveDate;
use council::config::Settings;
use council::db::{count_rows, Repository, SqliteRepository, StrategyKind, TransactionType};
use council::engine::Orchestrator;
use council::pricing::StaticFundamentals;
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn market() -> StaticFundamentals {
    StaticFundamentals::new()
        .with_price("VTI", dec!(250))
        .with_price("BND", dec!(72))
}

fn deploy_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
}

#[test]
fn run_survives_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("council.db");
    let settings = Settings::default();
    let market = market();

    let run = {
        let repo = SqliteRepository::open(&path).unwrap();
        Orchestrator::new(&repo, &market, &settings)
            .with_date(deploy_day())
            .run_cycle("alice", StrategyKind::Passive)
            .unwrap()
    };

    let repo = SqliteRepository::open(&path).unwrap();
    let portfolio = repo
        .get_portfolio("alice", StrategyKind::Passive)
        .unwrap()
        .expect("portfolio persisted");
    assert_eq!(portfolio.cash, dec!(48));
    assert_eq!(portfolio.position("VTI").unwrap().shares, dec!(280));
    assert_eq!(portfolio.position("BND").unwrap().shares, dec!(416));

    let runs = repo.get_runs(StrategyKind::Passive, 5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, run.id);
    assert_eq!(runs[0].recommendations, run.recommendations);
    assert_eq!(runs[0].executed_trades, run.executed_trades);
    assert_eq!(runs[0].value_after, dec!(100000));

    let txns = repo.get_transactions("alice", 10).unwrap();
    assert_eq!(txns.len(), 2);
    assert!(txns.iter().all(|t| t.transaction_type == TransactionType::Buy));
    let mut ids: Vec<&str> = txns.iter().map(|t| t.id.as_str()).collect();
    let mut expected: Vec<&str> = run.executed_trades.iter().map(String::as_str).collect();
    ids.sort();
    expected.sort();
    assert_eq!(ids, expected);
}

#[test]
fn owners_and_strategies_are_isolated() {
    let dir = TempDir::new().unwrap();
    let repo = SqliteRepository::open(&dir.path().join("council.db")).unwrap();
    let settings = Settings::default();
    let market = market();
    let orchestrator = Orchestrator::new(&repo, &market, &settings).with_date(deploy_day());

    orchestrator.run_cycle("alice", StrategyKind::Passive).unwrap();
    orchestrator.run_cycle("bob", StrategyKind::Passive).unwrap();
    orchestrator.run_cycle("bob", StrategyKind::Quality).unwrap();

    assert_eq!(repo.list_portfolios("alice").unwrap().len(), 1);
    let bobs = repo.list_portfolios("bob").unwrap();
    let kinds: Vec<StrategyKind> = bobs.iter().map(|p| p.strategy).collect();
    assert_eq!(kinds, vec![StrategyKind::Passive, StrategyKind::Quality]);

    assert_eq!(repo.get_transactions("alice", 50).unwrap().len(), 2);
    assert_eq!(repo.get_transactions("bob", 50).unwrap().len(), 2);
    assert_eq!(count_rows(repo.connection(), "portfolios").unwrap(), 3);
    assert_eq!(count_rows(repo.connection(), "runs").unwrap(), 3);
}

#[test]
fn summary_reads_back_persisted_state() {
    let dir = TempDir::new().unwrap();
    let repo = SqliteRepository::open(&dir.path().join("council.db")).unwrap();
    let settings = Settings::default();
    let market = market();
    let orchestrator = Orchestrator::new(&repo, &market, &settings).with_date(deploy_day());
    orchestrator.run_cycle("alice", StrategyKind::Passive).unwrap();

    // Prices moved since the run
    let moved = StaticFundamentals::new()
        .with_price("VTI", dec!(260))
        .with_price("BND", dec!(70));
    let summary = Orchestrator::new(&repo, &moved, &settings)
        .summarize("alice", StrategyKind::Passive)
        .unwrap()
        .unwrap();

    assert_eq!(summary.num_positions, 2);
    assert_eq!(summary.cash, dec!(48));
    assert_eq!(
        summary.total_value,
        dec!(48) + dec!(280) * dec!(260) + dec!(416) * dec!(70)
    );
    assert_eq!(summary.positions[0].symbol, "VTI");
}
