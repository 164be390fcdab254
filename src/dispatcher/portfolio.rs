use anyhow::Result;

use super::{App, Target};
use crate::cli::formatters;

pub fn dispatch_summary(app: &App, target: Target, owner: &str) -> Result<()> {
    tracing::info!("Summarizing portfolios for {}", owner);
    let orchestrator = app.orchestrator();

    match target {
        Target::One(kind) => match orchestrator.summarize(owner, kind)? {
            Some(summary) => app.emit(
                || formatters::format_json(&summary),
                || formatters::format_summary(&summary),
            ),
            None => app.emit(
                || "null".to_string(),
                || formatters::format_no_portfolio(owner, kind),
            ),
        },
        Target::All => {
            let summaries = orchestrator.portfolios(owner)?;
            app.emit(
                || formatters::format_json(&summaries),
                || {
                    if summaries.is_empty() {
                        return format!("No portfolios for {}\n", owner);
                    }
                    summaries.iter().map(formatters::format_summary).collect()
                },
            );
        }
    }
    Ok(())
}
