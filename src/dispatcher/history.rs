use anyhow::Result;

use super::App;
use crate::cli::formatters;
use council::db::StrategyKind;

pub fn dispatch_runs(app: &App, strategy: StrategyKind, limit: usize) -> Result<()> {
    let runs = app.orchestrator().runs(strategy, limit)?;
    app.emit(
        || formatters::format_json(&runs),
        || formatters::format_runs(strategy, &runs),
    );
    Ok(())
}

pub fn dispatch_transactions(app: &App, owner: &str, limit: usize) -> Result<()> {
    let transactions = app.orchestrator().transactions(owner, limit)?;
    app.emit(
        || formatters::format_json(&transactions),
        || formatters::format_transactions(owner, &transactions),
    );
    Ok(())
}
