//! Output formatting module for CLI display
//!
//! Handles all terminal output, separating what a command computes from how
//! it is shown. Every `format_*` function returns a string; the dispatcher
//! decides where it goes.

use chrono::NaiveDate;
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use council::db::{Run, StrategyKind, Transaction};
use council::engine::{CycleOutcome, OutcomeStatus};
use council::reports::PortfolioSummary;
use council::utils::{format_currency, format_percent, format_shares, format_signed_currency};

/// Pretty JSON for any serializable result
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn colored_change(value: Decimal) -> String {
    let text = format_signed_currency(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn colored_percent(value: Decimal) -> String {
    let text = format_percent(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

/// A completed run: narrative, recommendations, and value movement
pub fn format_run(run: &Run) -> String {
    let mut output = format!(
        "\n{} {} run for {}\n\n",
        "▶".cyan().bold(),
        run.strategy.display_name().bold(),
        run.owner
    );

    output.push_str(&run.analysis);
    output.push_str("\n\n");

    if run.recommendations.is_empty() {
        output.push_str(&format!("{} No recommendations\n", "ℹ".blue().bold()));
    } else {
        #[derive(Tabled)]
        struct RecommendationRow {
            #[tabled(rename = "Action")]
            action: String,
            #[tabled(rename = "Symbol")]
            symbol: String,
            #[tabled(rename = "Shares")]
            shares: String,
            #[tabled(rename = "Confidence")]
            confidence: String,
            #[tabled(rename = "Reasoning")]
            reasoning: String,
        }

        let rows: Vec<RecommendationRow> = run
            .recommendations
            .iter()
            .map(|r| RecommendationRow {
                action: r.action.as_str().to_uppercase(),
                symbol: r.symbol.clone(),
                shares: format_shares(r.shares),
                confidence: format_percent(r.confidence * Decimal::ONE_HUNDRED),
                reasoning: r.reasoning.clone(),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(2..4), Alignment::right());
        output.push_str(&table.to_string());
        output.push('\n');
    }

    output.push_str(&format!(
        "\n{:<16} {} of {}\n",
        "Executed:".bold(),
        run.executed_trades.len(),
        run.recommendations.len()
    ));
    output.push_str(&format!(
        "{:<16} {} → {} ({})\n",
        "Value:".bold(),
        format_currency(run.value_before),
        format_currency(run.value_after),
        colored_change(run.value_change())
    ));
    output
}

/// One line per strategy after `run all`
pub fn format_outcomes(owner: &str, outcomes: &[CycleOutcome]) -> String {
    #[derive(Tabled)]
    struct OutcomeRow {
        #[tabled(rename = "Strategy")]
        strategy: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Trades")]
        trades: String,
        #[tabled(rename = "Value Change")]
        change: String,
    }

    let rows: Vec<OutcomeRow> = outcomes
        .iter()
        .map(|o| match &o.status {
            OutcomeStatus::Success {
                trades, value_change, ..
            } => OutcomeRow {
                strategy: o.strategy.display_name().to_string(),
                status: "ok".green().to_string(),
                trades: trades.to_string(),
                change: colored_change(*value_change),
            },
            OutcomeStatus::Error { error } => OutcomeRow {
                strategy: o.strategy.display_name().to_string(),
                status: format!("failed: {}", error).red().to_string(),
                trades: "-".to_string(),
                change: "-".to_string(),
            },
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());

    let total_trades: usize = outcomes.iter().map(CycleOutcome::trades).sum();
    let total_change: Decimal = outcomes.iter().map(CycleOutcome::value_change).sum();
    format!(
        "\n{} Daily run for {}\n\n{}\n\n{:<16} {}\n{:<16} {}\n",
        "📊".cyan().bold(),
        owner,
        table,
        "Total trades:".bold(),
        total_trades,
        "Total change:".bold(),
        colored_change(total_change)
    )
}

/// Holdings table plus totals for one portfolio
pub fn format_summary(summary: &PortfolioSummary) -> String {
    let mut output = format!(
        "\n{} {} portfolio for {}\n\n",
        "📊".cyan().bold(),
        summary.strategy.display_name().bold(),
        summary.owner
    );

    if summary.positions.is_empty() {
        output.push_str(&format!("{} No positions held\n", "ℹ".blue().bold()));
    } else {
        #[derive(Tabled)]
        struct PositionRow {
            #[tabled(rename = "Symbol")]
            symbol: String,
            #[tabled(rename = "Shares")]
            shares: String,
            #[tabled(rename = "Avg Cost")]
            avg_cost: String,
            #[tabled(rename = "Price")]
            price: String,
            #[tabled(rename = "Value")]
            value: String,
            #[tabled(rename = "P&L")]
            pl: String,
            #[tabled(rename = "Return %")]
            return_pct: String,
            #[tabled(rename = "Weight")]
            weight: String,
        }

        let rows: Vec<PositionRow> = summary
            .positions
            .iter()
            .map(|p| PositionRow {
                symbol: p.symbol.clone(),
                shares: format_shares(p.shares),
                avg_cost: format_currency(p.avg_cost),
                price: format_currency(p.current_price),
                value: format_currency(p.market_value),
                pl: colored_change(p.gain_loss),
                return_pct: colored_percent(p.gain_loss_pct),
                weight: format_percent(p.weight_pct),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::modern());
        // Right-align everything except Symbol
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());
        output.push('\n');
    }

    output.push_str(&format!("\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!("\n{:<20} {}", "Cash:".bold(), format_currency(summary.cash)));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Positions:".bold(),
        format_currency(summary.positions_value)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Value:".bold(),
        format_currency(summary.total_value)
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Unrealized P&L:".bold(),
        colored_change(summary.total_gain_loss)
    ));
    output
}

pub fn format_runs(strategy: StrategyKind, runs: &[Run]) -> String {
    if runs.is_empty() {
        return format!(
            "{} No {} runs recorded yet\n",
            "ℹ".blue().bold(),
            strategy.display_name()
        );
    }

    #[derive(Tabled)]
    struct RunRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Owner")]
        owner: String,
        #[tabled(rename = "Recs")]
        recommendations: usize,
        #[tabled(rename = "Trades")]
        trades: usize,
        #[tabled(rename = "Before")]
        before: String,
        #[tabled(rename = "After")]
        after: String,
        #[tabled(rename = "Change")]
        change: String,
        #[tabled(rename = "Secs")]
        duration: String,
    }

    let rows: Vec<RunRow> = runs
        .iter()
        .map(|r| RunRow {
            date: r.run_date.format("%Y-%m-%d %H:%M").to_string(),
            owner: r.owner.clone(),
            recommendations: r.recommendations.len(),
            trades: r.executed_trades.len(),
            before: format_currency(r.value_before),
            after: format_currency(r.value_after),
            change: colored_change(r.value_change()),
            duration: format!("{:.2}", r.duration_seconds),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());
    format!(
        "\n{} {} runs\n\n{}\n",
        "📜".cyan().bold(),
        strategy.display_name().bold(),
        table
    )
}

pub fn format_transactions(owner: &str, transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return format!("{} No trades recorded for {}\n", "ℹ".blue().bold(), owner);
    }

    #[derive(Tabled)]
    struct TransactionRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Strategy")]
        strategy: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Shares")]
        shares: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Total")]
        total: String,
        #[tabled(rename = "Reasoning")]
        reasoning: String,
    }

    let rows: Vec<TransactionRow> = transactions
        .iter()
        .map(|t| TransactionRow {
            date: t.created_at.format("%Y-%m-%d %H:%M").to_string(),
            strategy: t.strategy.to_string(),
            kind: t.transaction_type.as_str().to_uppercase(),
            symbol: t.symbol.clone(),
            shares: format_shares(t.shares),
            price: format_currency(t.price),
            total: format_currency(t.total_value()),
            reasoning: t.reasoning.clone(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..7), Alignment::right());
    format!("\n{} Trades for {}\n\n{}\n", "💱".cyan().bold(), owner, table)
}

#[derive(Serialize)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

pub fn strategy_infos() -> Vec<StrategyInfo> {
    StrategyKind::ALL
        .iter()
        .map(|k| StrategyInfo {
            name: k.as_str(),
            display_name: k.display_name(),
            description: k.description(),
        })
        .collect()
}

pub fn format_strategies() -> String {
    #[derive(Tabled)]
    struct StrategyRow {
        #[tabled(rename = "Name")]
        name: &'static str,
        #[tabled(rename = "Strategy")]
        display_name: &'static str,
        #[tabled(rename = "Approach")]
        description: &'static str,
    }

    let rows: Vec<StrategyRow> = strategy_infos()
        .into_iter()
        .map(|s| StrategyRow {
            name: s.name,
            display_name: s.display_name,
            description: s.description,
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    format!("{}\n", table)
}

pub fn format_no_portfolio(owner: &str, strategy: StrategyKind) -> String {
    format!(
        "{} No {} portfolio for {}\nCreate one with: {} run {} --owner {}\n",
        "ℹ".blue().bold(),
        strategy.display_name(),
        owner,
        "council".bold(),
        strategy,
        owner
    )
}

pub fn format_market_closed(date: NaiveDate) -> String {
    format!(
        "{} Market closed on {} ({}); nothing to do. Use --force to run anyway.\n",
        "⏸".yellow().bold(),
        date,
        date.format("%A")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use council::db::{Portfolio, Position, Recommendation};
    use rust_decimal_macros::dec;

    fn sample_run() -> Run {
        Run {
            id: "run-1".into(),
            strategy: StrategyKind::Passive,
            owner: "alice".into(),
            run_date: Utc::now(),
            analysis: "Stay the course".into(),
            recommendations: vec![Recommendation::buy(
                "VTI",
                dec!(280),
                "Monthly allocation to total market index",
                dec!(0.95),
            )],
            executed_trades: vec!["txn-1".into()],
            value_before: dec!(100000),
            value_after: dec!(100250),
            duration_seconds: 0.12,
        }
    }

    #[test]
    fn test_run_output_mentions_trades_and_values() {
        let text = format_run(&sample_run());
        assert!(text.contains("Passive Allocator"));
        assert!(text.contains("Stay the course"));
        assert!(text.contains("VTI"));
        assert!(text.contains("95.00%"));
        assert!(text.contains("1 of 1"));
        assert!(text.contains("$100,000.00"));
        assert!(text.contains("+$250.00"));
    }

    #[test]
    fn test_summary_output() {
        let mut portfolio = Portfolio::new("alice", StrategyKind::Garp, dec!(1000));
        portfolio
            .positions
            .insert("NKE".into(), Position::new("NKE", dec!(10), dec!(95.5)));
        let text = format_summary(&PortfolioSummary::from_portfolio(&portfolio));
        assert!(text.contains("NKE"));
        assert!(text.contains("$955.00"));
        assert!(text.contains("$1,955.00"));
    }

    #[test]
    fn test_empty_messages() {
        assert!(format_runs(StrategyKind::Thematic, &[]).contains("No Thematic Growth runs"));
        assert!(format_transactions("bob", &[]).contains("No trades recorded for bob"));
        let msg = format_no_portfolio("bob", StrategyKind::DeepValue);
        assert!(msg.contains("run deep_value --owner bob"));
    }

    #[test]
    fn test_market_closed_names_the_day() {
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(format_market_closed(saturday).contains("Saturday"));
    }

    #[test]
    fn test_strategies_listing() {
        let text = format_strategies();
        for kind in StrategyKind::ALL {
            assert!(text.contains(kind.as_str()));
        }
        let json = format_json(&strategy_infos());
        assert!(json.contains("\"risk_parity\""));
    }
}
