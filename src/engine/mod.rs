//! Trade execution and run orchestration

pub mod execution;
pub mod orchestrator;

pub use execution::{DeclineReason, Execution, ExecutionEngine};
pub use orchestrator::{is_market_day, CycleOutcome, Orchestrator, OutcomeStatus};
