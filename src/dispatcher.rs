//! Command dispatcher that routes parsed CLI commands to their handlers.
//!
//! Opens the database and the fundamentals source once, then hands both to
//! the handler for the command.

mod history;
mod portfolio;
mod run;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use crate::cli::{formatters, Cli, Commands};
use council::config::Settings;
use council::db::{SqliteRepository, StrategyKind};
use council::engine::Orchestrator;
use council::error::CouncilError;
use council::pricing::{CachedProvider, FundamentalsProvider, StaticFundamentals, YahooFundamentals};

/// What every handler needs: configuration, storage and market data
pub struct App {
    pub settings: Settings,
    pub repo: SqliteRepository,
    pub market: Box<dyn FundamentalsProvider>,
    pub json: bool,
}

impl App {
    fn open(cli: &Cli, settings: Settings) -> Result<Self> {
        let db_path: PathBuf = match &cli.db {
            Some(path) => path.clone(),
            None => settings.db_path()?,
        };
        let repo = SqliteRepository::open(&db_path)?;

        let market: Box<dyn FundamentalsProvider> = match &cli.fundamentals {
            Some(path) => Box::new(StaticFundamentals::from_json_file(path)?),
            None => {
                info!("Using live fundamentals (cache TTL {} min)", settings.cache_ttl_minutes);
                Box::new(CachedProvider::with_ttl(YahooFundamentals::new()?, settings.cache_ttl()))
            }
        };

        Ok(Self {
            settings,
            repo,
            market,
            json: cli.json,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(&self.repo, self.market.as_ref(), &self.settings)
    }

    /// Print either the JSON rendering or the human one
    pub fn emit(&self, json: impl FnOnce() -> String, text: impl FnOnce() -> String) {
        if self.json {
            println!("{}", json());
        } else {
            print!("{}", text());
        }
    }
}

/// Which strategies a command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    One(StrategyKind),
    All,
}

/// Parse a strategy name or alias, rejecting anything unknown
pub fn parse_strategy(name: &str) -> Result<StrategyKind> {
    name.parse::<StrategyKind>().map_err(|_| {
        let known: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.as_str()).collect();
        CouncilError::InvalidInput(format!(
            "unknown strategy '{}' (expected one of: {})",
            name,
            known.join(", ")
        ))
        .into()
    })
}

pub fn parse_target(name: &str) -> Result<Target> {
    if name.trim().eq_ignore_ascii_case("all") {
        Ok(Target::All)
    } else {
        parse_strategy(name).map(Target::One)
    }
}

/// Route a parsed command to its handler
pub fn dispatch(cli: &Cli, settings: Settings) -> Result<()> {
    // Static listing; no database or network needed
    if let Commands::Strategies = cli.command {
        if cli.json {
            println!("{}", formatters::format_json(&formatters::strategy_infos()));
        } else {
            print!("{}", formatters::format_strategies());
        }
        return Ok(());
    }

    let app = App::open(cli, settings)?;

    match &cli.command {
        Commands::Run {
            strategy,
            owner,
            force,
        } => run::dispatch_run(&app, parse_target(strategy)?, owner, *force),
        Commands::Summary { strategy, owner } => {
            portfolio::dispatch_summary(&app, parse_target(strategy)?, owner)
        }
        Commands::Runs { strategy, limit } => {
            history::dispatch_runs(&app, parse_strategy(strategy)?, *limit)
        }
        Commands::Transactions { owner, limit } => {
            history::dispatch_transactions(&app, owner, *limit)
        }
        Commands::Strategies => Ok(()),
    }
}
