// Database module - repository contract, SQLite storage and models

pub mod memory;
pub mod models;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::CouncilError;
pub use memory::InMemoryRepository;
pub use models::{
    Portfolio, Position, Recommendation, Run, StrategyKind, Transaction, TransactionType,
};

/// Key-value persistence for portfolios, the transaction log and run history.
///
/// Every method may fail with an I/O error; callers propagate it and abort the
/// current cycle. Implementations never retry.
pub trait Repository {
    /// Portfolio for an (owner, strategy) pair, if one was ever created
    fn get_portfolio(&self, owner: &str, strategy: StrategyKind) -> Result<Option<Portfolio>>;

    /// Insert or replace a portfolio and its full set of positions
    fn put_portfolio(&self, portfolio: &Portfolio) -> Result<()>;

    /// All portfolios belonging to an owner, ordered by strategy
    fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>>;

    /// Append a transaction to the log
    fn put_transaction(&self, txn: &Transaction) -> Result<()>;

    /// Most recent transactions for an owner, newest first
    fn get_transactions(&self, owner: &str, limit: usize) -> Result<Vec<Transaction>>;

    /// Append a run record
    fn put_run(&self, run: &Run) -> Result<()>;

    /// Most recent runs for a strategy, newest first
    fn get_runs(&self, strategy: StrategyKind, limit: usize) -> Result<Vec<Run>>;
}

/// Get the default database path (~/.council/council.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    db_path_under(Path::new(&home))
}

/// `<home>/.council/council.db`, creating the directory
pub fn db_path_under(home: &Path) -> Result<PathBuf> {
    let council_dir = home.join(".council");

    std::fs::create_dir_all(&council_dir).context("Failed to create .council directory")?;

    Ok(council_dir.join("council.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Apply the embedded schema to a connection (idempotent)
pub fn init_schema(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;
    Ok(())
}

/// SQLite-backed repository
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `path` and apply the schema
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening database at: {:?}", path);
        let conn = open_db(Some(path.to_path_buf()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn load_positions(&self, portfolio_id: &str) -> Result<BTreeMap<String, Position>> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, shares, avg_cost, current_price
             FROM positions WHERE portfolio_id = ?1 ORDER BY symbol",
        )?;

        let positions = stmt
            .query_map([portfolio_id], |row| {
                Ok(Position {
                    symbol: row.get(0)?,
                    shares: get_decimal_value(row, 1)?,
                    avg_cost: get_decimal_value(row, 2)?,
                    current_price: get_decimal_value(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(positions
            .into_iter()
            .map(|p| (p.symbol.clone(), p))
            .collect())
    }

    fn query_portfolios(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Portfolio>> {
        let mut stmt = self.conn.prepare(sql)?;
        let headers = stmt
            .query_map(args, |row| {
                Ok(Portfolio {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    strategy: get_strategy_value(row, 2)?,
                    cash: get_decimal_value(row, 3)?,
                    positions: BTreeMap::new(),
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut portfolios = Vec::with_capacity(headers.len());
        for mut portfolio in headers {
            portfolio.positions = self.load_positions(&portfolio.id)?;
            portfolios.push(portfolio);
        }
        Ok(portfolios)
    }
}

impl Repository for SqliteRepository {
    fn get_portfolio(&self, owner: &str, strategy: StrategyKind) -> Result<Option<Portfolio>> {
        let found = self
            .query_portfolios(
                "SELECT id, owner, strategy, cash, created_at, updated_at
                 FROM portfolios WHERE owner = ?1 AND strategy = ?2",
                &[&owner, &strategy.as_str()],
            )
            .with_context(|| {
                CouncilError::Repository(format!(
                    "failed to load {} portfolio for {}",
                    strategy, owner
                ))
            })?;
        Ok(found.into_iter().next())
    }

    fn put_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        let write = || -> Result<()> {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO portfolios (id, owner, strategy, cash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET cash = excluded.cash, updated_at = excluded.updated_at",
                params![
                    portfolio.id,
                    portfolio.owner,
                    portfolio.strategy.as_str(),
                    portfolio.cash.to_string(),
                    portfolio.created_at,
                    portfolio.updated_at,
                ],
            )?;
            tx.execute(
                "DELETE FROM positions WHERE portfolio_id = ?1",
                [&portfolio.id],
            )?;
            for position in portfolio.positions.values() {
                tx.execute(
                    "INSERT INTO positions (portfolio_id, symbol, shares, avg_cost, current_price)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        portfolio.id,
                        position.symbol,
                        position.shares.to_string(),
                        position.avg_cost.to_string(),
                        position.current_price.to_string(),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        };

        write().with_context(|| {
            CouncilError::Repository(format!("failed to save portfolio {}", portfolio.id))
        })?;
        debug!(
            "Saved {} portfolio {} for {}",
            portfolio.strategy, portfolio.id, portfolio.owner
        );
        Ok(())
    }

    fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>> {
        let mut portfolios = self
            .query_portfolios(
                "SELECT id, owner, strategy, cash, created_at, updated_at
                 FROM portfolios WHERE owner = ?1",
                &[&owner],
            )
            .with_context(|| {
                CouncilError::Repository(format!("failed to list portfolios for {}", owner))
            })?;
        portfolios.sort_by_key(|p| p.strategy);
        Ok(portfolios)
    }

    fn put_transaction(&self, txn: &Transaction) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO transactions (
                    id, portfolio_id, owner, strategy, transaction_type,
                    symbol, shares, price, reasoning, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    txn.id,
                    txn.portfolio_id,
                    txn.owner,
                    txn.strategy.as_str(),
                    txn.transaction_type.as_str(),
                    txn.symbol,
                    txn.shares.to_string(),
                    txn.price.to_string(),
                    txn.reasoning,
                    txn.created_at,
                ],
            )
            .with_context(|| {
                CouncilError::Repository(format!("failed to save transaction {}", txn.id))
            })?;
        debug!("Saved transaction {}", txn.id);
        Ok(())
    }

    fn get_transactions(&self, owner: &str, limit: usize) -> Result<Vec<Transaction>> {
        let read = || -> Result<Vec<Transaction>> {
            let mut stmt = self.conn.prepare(
                "SELECT id, portfolio_id, owner, strategy, transaction_type,
                        symbol, shares, price, reasoning, created_at
                 FROM transactions
                 WHERE owner = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let txns = stmt
                .query_map(params![owner, limit as i64], |row| {
                    Ok(Transaction {
                        id: row.get(0)?,
                        portfolio_id: row.get(1)?,
                        owner: row.get(2)?,
                        strategy: get_strategy_value(row, 3)?,
                        transaction_type: get_transaction_type_value(row, 4)?,
                        symbol: row.get(5)?,
                        shares: get_decimal_value(row, 6)?,
                        price: get_decimal_value(row, 7)?,
                        reasoning: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(txns)
        };

        read().with_context(|| {
            CouncilError::Repository(format!("failed to load transactions for {}", owner))
        })
    }

    fn put_run(&self, run: &Run) -> Result<()> {
        let recommendations =
            serde_json::to_string(&run.recommendations).context("Failed to encode recommendations")?;
        let executed =
            serde_json::to_string(&run.executed_trades).context("Failed to encode trade ids")?;

        self.conn
            .execute(
                "INSERT INTO runs (
                    id, strategy, owner, run_date, analysis, recommendations,
                    executed_trades, value_before, value_after, duration_seconds
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    run.id,
                    run.strategy.as_str(),
                    run.owner,
                    run.run_date,
                    run.analysis,
                    recommendations,
                    executed,
                    run.value_before.to_string(),
                    run.value_after.to_string(),
                    run.duration_seconds,
                ],
            )
            .with_context(|| CouncilError::Repository(format!("failed to save run {}", run.id)))?;
        debug!("Saved run {}", run.id);
        Ok(())
    }

    fn get_runs(&self, strategy: StrategyKind, limit: usize) -> Result<Vec<Run>> {
        let read = || -> Result<Vec<Run>> {
            let mut stmt = self.conn.prepare(
                "SELECT id, strategy, owner, run_date, analysis, recommendations,
                        executed_trades, value_before, value_after, duration_seconds
                 FROM runs
                 WHERE strategy = ?1
                 ORDER BY run_date DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![strategy.as_str(), limit as i64], |row| {
                    let recommendations: String = row.get(5)?;
                    let executed: String = row.get(6)?;
                    Ok((
                        Run {
                            id: row.get(0)?,
                            strategy: get_strategy_value(row, 1)?,
                            owner: row.get(2)?,
                            run_date: row.get(3)?,
                            analysis: row.get(4)?,
                            recommendations: Vec::new(),
                            executed_trades: Vec::new(),
                            value_before: get_decimal_value(row, 7)?,
                            value_after: get_decimal_value(row, 8)?,
                            duration_seconds: row.get(9)?,
                        },
                        recommendations,
                        executed,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(mut run, recommendations, executed)| {
                    run.recommendations = serde_json::from_str(&recommendations)
                        .with_context(|| format!("Corrupt recommendations in run {}", run.id))?;
                    run.executed_trades = serde_json::from_str(&executed)
                        .with_context(|| format!("Corrupt trade ids in run {}", run.id))?;
                    Ok(run)
                })
                .collect()
        };

        read().with_context(|| {
            CouncilError::Repository(format!("failed to load runs for {}", strategy))
        })
    }
}

/// Helper to read Decimal from SQLite (handles both INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Real, Box::new(e))
        }),
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}

fn get_strategy_value(row: &rusqlite::Row, idx: usize) -> Result<StrategyKind, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    raw.parse::<StrategyKind>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, format!("strategy '{}'", raw), rusqlite::types::Type::Text)
    })
}

fn get_transaction_type_value(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<TransactionType, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    raw.parse::<TransactionType>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            format!("transaction type '{}'", raw),
            rusqlite::types::Type::Text,
        )
    })
}

/// Count rows in a table; used by diagnostics and tests
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: Option<i64> = conn.query_row(&sql, [], |row| row.get(0)).optional()?;
    Ok(count.unwrap_or(0))
}
