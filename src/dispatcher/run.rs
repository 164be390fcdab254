use anyhow::Result;
use chrono::Local;
use serde_json::json;
use tracing::info;

use super::{App, Target};
use crate::cli::formatters;
use council::engine::{is_market_day, CycleOutcome};

pub fn dispatch_run(app: &App, target: Target, owner: &str, force: bool) -> Result<()> {
    let today = Local::now().date_naive();
    if !force && !is_market_day(today) {
        info!("Market closed on {}, skipping run", today);
        app.emit(
            || {
                formatters::format_json(&json!({
                    "skipped": true,
                    "reason": "market closed",
                    "date": today.to_string(),
                }))
            },
            || formatters::format_market_closed(today),
        );
        return Ok(());
    }

    let orchestrator = app.orchestrator().with_date(today);

    match target {
        Target::One(kind) => {
            let run = orchestrator.run_cycle(owner, kind)?;
            app.emit(|| formatters::format_json(&run), || formatters::format_run(&run));
            Ok(())
        }
        Target::All => {
            let outcomes = orchestrator.run_all(owner);
            app.emit(
                || formatters::format_json(&outcomes),
                || formatters::format_outcomes(owner, &outcomes),
            );

            let failed = outcomes.iter().filter(|o| o.is_err()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} strategies failed", failed, outcomes.len());
            }
            let trades: usize = outcomes.iter().map(CycleOutcome::trades).sum();
            info!("Daily run for {} complete: {} trades", owner, trades);
            Ok(())
        }
    }
}
