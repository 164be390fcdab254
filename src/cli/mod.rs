use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "council")]
#[command(version, about = "Portfolio simulation engine run by six investor philosophies")]
#[command(
    long_about = "Runs simulated portfolios side by side, one per strategy (passive, quality, deep value, GARP, risk parity, thematic). Each run analyzes the market, recommends trades, executes the confident ones at current prices and records the result."
)]
pub struct Cli {
    /// SQLite database file (default: ~/.council/council.db)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Read fundamentals from a JSON fixture instead of the live feed
    #[arg(long, global = true, value_name = "JSON")]
    pub fundamentals: Option<PathBuf>,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one strategy (or "all") for an owner
    Run {
        /// Strategy name or "all"
        strategy: String,

        /// Portfolio owner
        #[arg(short, long)]
        owner: String,

        /// Run even when the market is closed
        #[arg(long)]
        force: bool,
    },

    /// Show current holdings and value (strategy name or "all")
    Summary {
        strategy: String,

        #[arg(short, long)]
        owner: String,
    },

    /// Recent runs of a strategy, newest first
    Runs {
        strategy: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Executed trades for an owner, newest first
    Transactions {
        #[arg(short, long)]
        owner: String,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// List the available strategies
    Strategies,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::try_parse_from([
            "council", "run", "graham", "--owner", "alice", "--force", "--json", "--db", "x.db",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        match cli.command {
            Commands::Run { strategy, owner, force } => {
                assert_eq!(strategy, "graham");
                assert_eq!(owner, "alice");
                assert!(force);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_owner_is_required() {
        assert!(Cli::try_parse_from(["council", "summary", "passive"]).is_err());
    }
}
